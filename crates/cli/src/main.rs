//! Emporium CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (including the session table)
//! emporium-cli migrate
//!
//! # Grant or revoke the admin role
//! emporium-cli user promote -e ops@example.com
//! emporium-cli user demote -e ops@example.com
//!
//! # Upsert the catalog from a YAML file
//! emporium-cli seed products catalog.yaml
//! ```
//!
//! # Environment Variables
//!
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "emporium-cli")]
#[command(author, version, about = "Emporium CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user roles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load data from files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Grant the admin role
    Promote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke the admin role
    Demote {
        /// User email address
        #[arg(short, long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or replace products from a YAML file
    Products {
        /// Path to the YAML catalog
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Promote { email } => commands::user::promote(&email).await?,
            UserAction::Demote { email } => commands::user::demote(&email).await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_promote() {
        let cli = Cli::try_parse_from(["emporium-cli", "user", "promote", "-e", "a@b.co"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Promote { .. }
            })
        ));
    }
}

//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - id: 1
//!     name: Cotton Tee
//!     price: 499.00
//!     variants:
//!       - { name: S, price: 499.00, stock: 10 }
//!       - { name: M, price: 499.00, stock: 12 }
//!   - id: 2
//!     name: Canvas Tote
//!     price: 349.00
//!     stock: 40
//! ```
//!
//! Products are upserted by id, so re-running a seed rewrites prices and stock.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use emporium_api::db::{ProductRepository, ProductSeed};

use super::connect;

/// Top-level layout of a catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub products: Vec<ProductSeed>,
}

/// Upsert every product in `file_path`.
///
/// The whole file is validated before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation fails,
/// or a database operation fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");

    let content = tokio::fs::read_to_string(path).await?;
    let catalog: CatalogSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&catalog);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    for product in &catalog.products {
        repo.upsert_seed(product).await?;
        info!(
            product_id = product.id,
            variants = product.variants.len(),
            "Seeded {}",
            product.name
        );
    }

    info!("Seeding complete! {} products", catalog.products.len());
    Ok(())
}

fn validate(catalog: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for product in &catalog.products {
        let label = format!("product {}", product.id);

        if product.id <= 0 {
            errors.push(format!("{label}: id must be positive"));
        }
        if !seen.insert(product.id) {
            errors.push(format!("{label}: duplicate id"));
        }
        if product.name.trim().is_empty() {
            errors.push(format!("{label}: name is required"));
        }
        if product.price < Decimal::ZERO {
            errors.push(format!("{label}: price must not be negative"));
        }
        if product.stock < 0 {
            errors.push(format!("{label}: stock must not be negative"));
        }

        for (index, variant) in product.variants.iter().enumerate() {
            if variant.name.trim().is_empty() {
                errors.push(format!("{label} variant {index}: name is required"));
            }
            if variant.price < Decimal::ZERO {
                errors.push(format!("{label} variant {index}: price must not be negative"));
            }
            if variant.stock < 0 {
                errors.push(format!("{label} variant {index}: stock must not be negative"));
            }
        }
    }

    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_validate_catalog() {
        let yaml = "
products:
  - id: 1
    name: Cotton Tee
    price: 499.00
    variants:
      - { name: S, price: 499.00, stock: 10 }
  - id: 2
    name: Canvas Tote
    price: 349.00
    stock: 40
";
        let catalog: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(catalog.products.len(), 2);
        assert!(validate(&catalog).is_empty());
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let yaml = "
products:
  - id: 3
    name: ' '
    price: -1
    stock: -2
  - id: 3
    name: Dup
    price: 10
    variants:
      - { name: '', price: 1, stock: -1 }
";
        let catalog: CatalogSeed = serde_yaml::from_str(yaml).unwrap();
        let errors = validate(&catalog);
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| e.contains("duplicate id")));
    }
}

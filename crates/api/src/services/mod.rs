//! Business logic services.

pub mod auth;
pub mod email;
pub mod inventory;
pub mod orders;

pub use auth::{AuthError, AuthService};
pub use email::{EmailError, EmailService};
pub use inventory::{InventoryError, InventoryService};
pub use orders::{OrderError, OrderService};

//! Domain models for the order API.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{Order, OrderItem};
pub use product::{Product, ProductVariant};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;

//! Emporium Core - Shared domain types and order rules.
//!
//! This crate provides the types and pure business rules used across all
//! Emporium components:
//! - `api` - Order lifecycle HTTP service
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Everything here can be tested without
//! a running database.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, money and statuses
//! - [`order`] - Cart validation and order totals
//! - [`shipping`] - Postal-code based shipping rates
//! - [`stock`] - All-or-nothing stock deduction planning

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod order;
pub mod shipping;
pub mod stock;
pub mod types;

pub use order::{CustomerInfo, LineItemRequest, OrderTotals, OrderValidationError, PricedLine};
pub use shipping::ShippingPolicy;
pub use stock::{Deduction, Shortfall, StockError, StockKey};
pub use types::*;

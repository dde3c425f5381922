//! Aggregates module
pub mod product;
pub mod order;
pub mod customer;

pub use product::{Product, ProductDetails, ProductError, ProductStatus};
pub use order::{Order, OrderError, OrderStatus, LineItem};
pub use customer::{Customer, CustomerStatus, CustomerSummary, normalize_email};

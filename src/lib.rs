//! Webshop back-office
//!
//! Admin and customer API for a small webshop selling into the Benelux, Germany and France.
//!
//! ## Features
//! - Customer, product and order management
//! - Weight-band shipping rules and EU VAT
//! - Per-order, per-product and per-period profit analysis
//! - Google Ads, Meta Ads, DHL and SMTP integrations, mocked when unconfigured
//! - Customer portal with self-service checkout

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod events;
pub mod integrations;
pub mod pricing;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use state::AppState;

//! Workflows that span several tables or call out to integrations.

pub mod insights;
pub mod labels;
pub mod orders;
pub mod profit;

//! Transaction bundles.
//!
//! - [`parser`] - Structural validation, entry classification and normalization
//! - [`handler`] - The [`BundleHandler`] pipeline
//! - [`generator`] - `transaction-response` rendering

pub mod generator;
pub mod handler;
pub mod parser;

pub use handler::BundleHandler;

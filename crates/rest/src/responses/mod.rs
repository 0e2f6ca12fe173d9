//! Response formatting for the FHIR REST API.
//!
//! This module provides utilities for building FHIR-compliant responses:
//!
//! - [`operation_outcome`] - OperationOutcome generation
//! - [`bundle`] - Bundle response building (search, history, transaction-response)
//! - [`headers`] - Response header generation (ETag, Last-Modified)

pub mod bundle;
pub mod headers;
pub mod operation_outcome;

pub use bundle::{BundleBuilder, BundleType, search_bundle};
pub use headers::ResourceHeaders;
pub use operation_outcome::{IssueType, error_outcome, success_outcome};

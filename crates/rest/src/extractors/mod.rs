//! Axum extractors for FHIR-specific data.
//!
//! - [`RequestScope`] - Verified caller, tenant and server URL of a request
//! - [`FhirResource`] - JSON request bodies

mod fhir_resource;
mod scope;

pub use fhir_resource::{ACCEPTED_CONTENT_TYPES, FhirResource, is_accepted_content_type};
pub use scope::{RequestScope, request_context};

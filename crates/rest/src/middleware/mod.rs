//! HTTP middleware for the FHIR REST API.
//!
//! This module contains Axum middleware components, applied in this order:
//!
//! - [`server_url`] - Per-request server URL (dynamic host, tenant prefix)
//! - [`identity`] - Access token verification
//! - [`tenant`] - Tenant resolution under multi-tenancy
//!
//! [`tenant_prefix`] holds the `/tenant/{id}` path helpers shared by all three.

pub mod identity;
pub mod server_url;
pub mod tenant;
pub mod tenant_prefix;

pub use identity::{RequestInformation, get_request_information, identity_middleware};
pub use server_url::{ServerUrl, server_url_middleware};
pub use tenant::tenant_middleware;

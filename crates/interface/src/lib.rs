//! # helios-interface - Backend contracts for the Helios FHIR façade
//!
//! The REST façade in `helios-rest` never talks to a database or an
//! authorization server directly. It reaches every collaborator through the
//! traits defined here, so deployments can plug in any backend technology.
//!
//! ## Modules
//!
//! - [`core`] - Capability traits: [`Persistence`], [`Search`], [`History`],
//!   [`BundleService`], [`Authorization`], [`Validator`]
//! - [`operation`] - FHIR interactions ([`TypeOperation`], [`SystemOperation`]) and [`FhirVersion`]
//! - [`identity`] - Caller claims ([`UserIdentity`]) and [`RequestContext`]
//! - [`error`] - [`FhirError`], the error shared by every contract
//! - [`backends`] - Reference implementations (in-memory store, pass-through authorization)
//!
//! ## Example
//!
//! ```rust
//! use helios_interface::backends::MemoryBackend;
//! use helios_interface::core::Persistence;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! let stored = backend
//!     .create_resource(None, "Patient", json!({"resourceType": "Patient"}), Some("123"))
//!     .await
//!     .unwrap();
//! assert_eq!(stored["meta"]["versionId"], "1");
//! # });
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod identity;
pub mod operation;

pub use crate::core::{
    Authorization, BatchReadWriteRequest, BatchReadWriteResponse, BundleService, History,
    Persistence, Search, Validator,
};
pub use error::{FhirError, FhirResult};
pub use identity::{RequestContext, UserIdentity};
pub use operation::{FhirVersion, Operation, SystemOperation, TypeOperation};

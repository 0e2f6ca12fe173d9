//! HTTP request handlers for FHIR interactions.
//!
//! This module contains handlers for all FHIR REST API interactions:
//!
//! - [`read`] - Read a resource by ID
//! - [`vread`] - Read a specific version of a resource
//! - [`create`] - Create a new resource
//! - [`update`] - Update an existing resource
//! - [`patch`] - Patch a resource
//! - [`delete`] - Delete a resource
//! - [`search`] - Type and system search
//! - [`history`] - Instance, type and system history
//! - [`batch`] - Transaction bundles posted to the server root
//! - [`docref`] - US Core `$docref`, answered as a DocumentReference search
//!
//! Route handlers only extract the request and pick the backend set;
//! [`ResourceHandler`] runs the interaction.

use helios_interface::core::QueryParams;
use serde::Deserialize;

pub mod batch;
pub mod create;
pub mod delete;
pub mod docref;
pub mod history;
pub mod patch;
pub mod read;
pub mod resource;
pub mod search;
pub mod update;
pub mod vread;

pub use batch::batch_handler;
pub use create::create_handler;
pub use delete::delete_handler;
pub use history::{history_instance_handler, history_system_handler, history_type_handler};
pub use patch::patch_handler;
pub use read::read_handler;
pub use resource::ResourceHandler;
pub use search::{search_get_handler, search_post_handler, search_system_handler};
pub use update::update_handler;
pub use vread::vread_handler;

/// `/{resource_type}`
#[derive(Debug, Deserialize)]
pub struct TypePath {
    /// Resource type segment.
    pub resource_type: String,
}

/// `/{resource_type}/{id}`
#[derive(Debug, Deserialize)]
pub struct InstancePath {
    /// Resource type segment.
    pub resource_type: String,
    /// Resource id segment.
    pub id: String,
}

/// `/{resource_type}/{id}/_history/{vid}`
#[derive(Debug, Deserialize)]
pub struct VersionPath {
    /// Resource type segment.
    pub resource_type: String,
    /// Resource id segment.
    pub id: String,
    /// Version id segment.
    pub vid: String,
}

/// Parses a raw query string into ordered key/value pairs.
pub fn query_params(raw: Option<&str>) -> QueryParams {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

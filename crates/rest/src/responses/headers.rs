//! Response header generation.
//!
//! Provides utilities for building FHIR-standard response headers.

use axum::http::{HeaderMap, HeaderValue, header};
use serde_json::Value;

/// Builder for resource response headers.
///
/// Generates standard FHIR response headers including:
/// - ETag (version identifier)
/// - Last-Modified
/// - Content-Type
#[derive(Debug, Default)]
pub struct ResourceHeaders {
    /// ETag value (weak validator).
    etag: Option<String>,
    /// Last-Modified timestamp.
    last_modified: Option<String>,
    /// Content-Type.
    content_type: String,
}

impl ResourceHeaders {
    /// Creates a new ResourceHeaders builder.
    pub fn new() -> Self {
        Self {
            content_type: "application/fhir+json".to_string(),
            ..Default::default()
        }
    }

    /// Creates headers from a resource's `meta`.
    ///
    /// `meta.versionId` becomes `ETag: W/"{versionId}"` and
    /// `meta.lastUpdated` is copied to `Last-Modified`. A resource without
    /// `meta` yields content type only.
    pub fn from_resource(resource: &Value) -> Self {
        let headers = Self::new();
        let Some(meta) = resource.get("meta") else {
            return headers;
        };

        let headers = match meta.get("versionId").and_then(Value::as_str) {
            Some(version_id) => headers.with_version(version_id),
            None => headers,
        };
        match meta.get("lastUpdated").and_then(Value::as_str) {
            Some(last_updated) => headers.with_last_modified(last_updated),
            None => headers,
        }
    }

    /// Sets the ETag from a version ID.
    pub fn with_version(mut self, version_id: &str) -> Self {
        self.etag = Some(format!("W/\"{}\"", version_id));
        self
    }

    /// Sets the Last-Modified timestamp.
    pub fn with_last_modified(mut self, timestamp: impl Into<String>) -> Self {
        self.last_modified = Some(timestamp.into());
        self
    }

    /// Converts to an Axum HeaderMap.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }

        if let Some(etag) = &self.etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(header::ETAG, value);
            }
        }

        if let Some(last_modified) = &self.last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(header::LAST_MODIFIED, value);
            }
        }

        headers
    }

    /// Returns the ETag value.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Returns the Last-Modified value.
    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }
}

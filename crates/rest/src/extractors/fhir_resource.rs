//! FHIR resource extractor.
//!
//! Extracts JSON request bodies for create, update, patch and bundle
//! requests.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header,
};
use serde_json::Value;

use crate::error::RestError;

/// Content types accepted for request bodies.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/fhir+json",
    "application/json-patch+json",
];

/// Axum extractor for JSON request bodies.
///
/// The body must be a JSON object. Whether it is a resource of the right
/// type is decided by the handler, which knows the route's resource type.
///
/// # Example
///
/// ```rust,ignore
/// use helios_rest::extractors::FhirResource;
///
/// async fn create_handler(FhirResource(resource): FhirResource) {
///     println!("Resource type: {}", resource["resourceType"]);
/// }
/// ```
#[derive(Debug)]
pub struct FhirResource(pub Value);

impl FhirResource {
    /// Returns the resource type.
    pub fn resource_type(&self) -> Option<&str> {
        self.0.get("resourceType").and_then(|v| v.as_str())
    }

    /// Returns the resource ID if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(|v| v.as_str())
    }

    /// Consumes the extractor and returns the inner Value.
    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Returns true when `content_type` (parameters ignored) is accepted.
pub fn is_accepted_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ACCEPTED_CONTENT_TYPES.contains(&essence.as_str())
}

impl<S> FromRequest<S> for FhirResource
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // Missing content type is treated as JSON
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        if !is_accepted_content_type(&content_type) {
            return Err(RestError::bad_request(format!(
                "Unsupported content type: {}",
                content_type
            )));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| RestError::bad_request(e.body_text()))?;

        let value: Value = serde_json::from_slice(&bytes)?;
        if !value.is_object() {
            return Err(RestError::InvalidResource {
                message: "Request body must be a JSON object".to_string(),
            });
        }

        Ok(FhirResource(value))
    }
}

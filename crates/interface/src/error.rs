//! Error types shared by every backend contract.
//!
//! Backends (persistence, search, history, bundle, authorization, validation)
//! report failures through [`FhirError`]. The REST layer maps each variant to
//! an HTTP status and a FHIR OperationOutcome.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The error type returned by backend capability traits.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FhirError {
    /// The submitted resource failed structural or semantic validation.
    #[error("{0}")]
    InvalidResource(String),

    /// The requested resource does not exist (or was deleted).
    #[error("Resource {resource_type}/{id} is not known")]
    ResourceNotFound { resource_type: String, id: String },

    /// The requested version of a resource does not exist.
    #[error("Version \"{version}\" is not valid for resource {resource_type}/{id}")]
    ResourceVersionNotFound {
        resource_type: String,
        id: String,
        version: String,
    },

    /// The caller is not permitted to perform the request.
    #[error("{0}")]
    Unauthorized(String),

    /// The request is malformed for the backend.
    #[error("{0}")]
    BadRequest(String),

    /// Unclassified backend failure.
    #[error("{0}")]
    Internal(String),
}

impl FhirError {
    /// Creates a [`FhirError::ResourceNotFound`].
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        FhirError::ResourceNotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates an [`FhirError::Unauthorized`] with the conventional message.
    pub fn unauthorized() -> Self {
        FhirError::Unauthorized("Forbidden".to_string())
    }

    /// Returns true if this is an authorization denial.
    ///
    /// Bundle read filtering recovers from these locally; every other
    /// variant fails the whole request.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FhirError::Unauthorized(_))
    }
}

/// Result type alias for backend operations.
pub type FhirResult<T> = Result<T, FhirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = FhirError::not_found("Patient", "123");
        assert_eq!(err.to_string(), "Resource Patient/123 is not known");
    }

    #[test]
    fn test_version_not_found_display() {
        let err = FhirError::ResourceVersionNotFound {
            resource_type: "Patient".to_string(),
            id: "123".to_string(),
            version: "7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Version \"7\" is not valid for resource Patient/123"
        );
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(FhirError::unauthorized().is_unauthorized());
        assert!(!FhirError::Internal("boom".to_string()).is_unauthorized());
        assert!(!FhirError::InvalidResource("bad".to_string()).is_unauthorized());
    }
}

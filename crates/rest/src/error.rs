//! Error types for the FHIR REST API.
//!
//! This module defines all error types used throughout the REST API layer,
//! with automatic conversion to FHIR OperationOutcome responses.
//!
//! # Error Mapping
//!
//! Backend errors ([`FhirError`]) are mapped to HTTP status codes and FHIR
//! issue codes:
//!
//! | Backend Error | HTTP Status | FHIR Issue Code |
//! |--------------|-------------|-----------------|
//! | ResourceNotFound | 404 | not-found |
//! | ResourceVersionNotFound | 404 | not-found |
//! | InvalidResource | 400 | invalid |
//! | BadRequest | 400 | invalid |
//! | Unauthorized | 403 | forbidden |
//! | Internal | 500 | exception |
//!
//! Tenant resolution and token verification failures are answered with
//! 401 `Unauthorized`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::FhirError;
use std::fmt;
use tracing::{error, warn};

use crate::responses::operation_outcome::{IssueType, error_outcome};
use crate::tenant::TenantError;

/// The primary error type for REST API operations.
///
/// This enum provides semantic error types that map cleanly to HTTP status codes
/// and FHIR OperationOutcome issue codes.
#[derive(Debug)]
pub enum RestError {
    /// Resource not found (HTTP 404).
    NotFound {
        /// The resource type (e.g., "Patient").
        resource_type: String,
        /// The resource ID.
        id: String,
    },

    /// Version not found for vread (HTTP 404).
    VersionNotFound {
        /// The resource type.
        resource_type: String,
        /// The resource ID.
        id: String,
        /// The version ID.
        version_id: String,
    },

    /// Interaction not offered for this resource type (HTTP 404).
    UnsupportedInteraction {
        /// The resource type.
        resource_type: String,
        /// The interaction code.
        interaction: String,
    },

    /// Bad request (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// The request body is not an acceptable resource (HTTP 400).
    InvalidResource {
        /// Validation message.
        message: String,
    },

    /// Caller could not be authenticated or bound to a tenant (HTTP 401).
    Unauthorized {
        /// Error message, logged only.
        message: String,
    },

    /// Access denied (HTTP 403).
    Forbidden {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { resource_type, id } => {
                write!(f, "Resource {}/{} is not known", resource_type, id)
            }
            RestError::VersionNotFound {
                resource_type,
                id,
                version_id,
            } => {
                write!(
                    f,
                    "Version \"{}\" is not valid for resource {}/{}",
                    version_id, resource_type, id
                )
            }
            RestError::UnsupportedInteraction {
                resource_type,
                interaction,
            } => {
                write!(f, "Interaction {} is not supported on {}", interaction, resource_type)
            }
            RestError::BadRequest { message } => {
                write!(f, "Bad request: {}", message)
            }
            RestError::InvalidResource { message } => {
                write!(f, "Invalid resource: {}", message)
            }
            RestError::Unauthorized { message } => {
                write!(f, "Unauthorized: {}", message)
            }
            RestError::Forbidden { message } => {
                write!(f, "Forbidden: {}", message)
            }
            RestError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. }
            | RestError::VersionNotFound { .. }
            | RestError::UnsupportedInteraction { .. } => StatusCode::NOT_FOUND,
            RestError::BadRequest { .. } | RestError::InvalidResource { .. } => {
                StatusCode::BAD_REQUEST
            }
            RestError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            RestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Creates a [`RestError::BadRequest`].
    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a [`RestError::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        RestError::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a [`RestError::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        RestError::InternalError {
            message: message.into(),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (code, details) = match &self {
            RestError::NotFound { .. } | RestError::VersionNotFound { .. } => {
                (IssueType::NotFound, self.to_string())
            }
            RestError::UnsupportedInteraction { .. } => (IssueType::NotSupported, self.to_string()),
            RestError::BadRequest { message } => (IssueType::Invalid, message.clone()),
            RestError::InvalidResource { message } => (
                IssueType::Invalid,
                format!(
                    "Failed to parse request body as JSON resource. Error was: {}",
                    message
                ),
            ),
            RestError::Unauthorized { message } => {
                warn!(reason = %message, "Rejecting unauthorized request");
                (IssueType::Login, "Unauthorized".to_string())
            }
            RestError::Forbidden { message } => {
                warn!(reason = %message, "Access denied");
                (IssueType::Forbidden, message.clone())
            }
            RestError::InternalError { message } => {
                error!(error = %message, "Internal server error");
                (IssueType::Exception, message.clone())
            }
        };

        (status, Json(error_outcome(code, &details))).into_response()
    }
}

impl From<FhirError> for RestError {
    fn from(err: FhirError) -> Self {
        match err {
            FhirError::ResourceNotFound { resource_type, id } => {
                RestError::NotFound { resource_type, id }
            }
            FhirError::ResourceVersionNotFound {
                resource_type,
                id,
                version,
            } => RestError::VersionNotFound {
                resource_type,
                id,
                version_id: version,
            },
            FhirError::InvalidResource(message) => RestError::InvalidResource { message },
            FhirError::Unauthorized(message) => RestError::Forbidden { message },
            FhirError::BadRequest(message) => RestError::BadRequest { message },
            FhirError::Internal(message) => RestError::InternalError { message },
        }
    }
}

impl From<TenantError> for RestError {
    fn from(err: TenantError) -> Self {
        RestError::Unauthorized {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::InvalidResource {
            message: err.to_string(),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = RestError::NotFound {
            resource_type: "Patient".to_string(),
            id: "123".to_string(),
        };
        assert_eq!(err.to_string(), "Resource Patient/123 is not known");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_from_fhir_error_mapping() {
        let cases = vec![
            (FhirError::not_found("Patient", "1"), StatusCode::NOT_FOUND),
            (
                FhirError::ResourceVersionNotFound {
                    resource_type: "Patient".to_string(),
                    id: "1".to_string(),
                    version: "9".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                FhirError::InvalidResource("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (FhirError::unauthorized(), StatusCode::FORBIDDEN),
            (FhirError::BadRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (
                FhirError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (fhir_error, status) in cases {
            assert_eq!(RestError::from(fhir_error).status_code(), status);
        }
    }

    #[test]
    fn test_tenant_error_is_unauthorized() {
        let err = RestError::from(TenantError::MissingTenant);
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_into_response_status() {
        let response = RestError::InvalidResource {
            message: "not a valid 'Patient'".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = RestError::unauthorized("no tenant").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

//! Transactional bundle contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FhirResult;
use crate::operation::TypeOperation;

/// A reference inside an entry's resource that points at another entry's
/// `fullUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReference {
    /// The literal reference value (`urn:uuid:...`).
    pub reference: String,
    /// JSON pointer of the `reference` string inside the entry's resource.
    pub pointer: String,
}

/// One normalized unit of work inside a transaction.
///
/// The position of a request in [`TransactionRequest::requests`] is the
/// position of its bundle entry; backends must answer in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadWriteRequest {
    pub operation: TypeOperation,
    pub resource_type: String,
    /// Target id. Generated for creates without one.
    pub id: String,
    pub vid: Option<String>,
    /// Payload; absent for read and delete.
    pub resource: Option<Value>,
    /// Client correlation token of the entry.
    pub full_url: Option<String>,
    /// References to other entries of the same bundle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<BundleReference>,
}

/// Per-entry outcome reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReadWriteResponse {
    pub id: String,
    /// Version id of the affected resource (the entry's etag).
    pub vid: String,
    pub operation: TypeOperation,
    pub last_modified: String,
    pub resource_type: String,
    /// Body for read-class operations; `{}` otherwise.
    pub resource: Value,
}

/// Classification of a failed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleErrorKind {
    /// The backend itself failed; the whole bundle may be retried.
    #[serde(rename = "SYSTEM_ERROR")]
    System,
    /// The backend rejected the submitted work.
    #[serde(rename = "USER_ERROR")]
    User,
}

/// Result of dispatching a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleServiceResponse {
    pub success: bool,
    pub error_kind: Option<BundleErrorKind>,
    pub message: String,
    /// One outcome per request, in request order.
    pub batch_read_write_responses: Vec<BatchReadWriteResponse>,
}

impl BundleServiceResponse {
    /// A successful response.
    pub fn succeeded(responses: Vec<BatchReadWriteResponse>) -> Self {
        Self {
            success: true,
            error_kind: None,
            message: "Successfully committed requests to DB".to_string(),
            batch_read_write_responses: responses,
        }
    }

    /// A failed response.
    pub fn failed(kind: BundleErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            message: message.into(),
            batch_read_write_responses: Vec::new(),
        }
    }
}

/// Work submitted to [`BundleService`].
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub requests: Vec<BatchReadWriteRequest>,
    pub start_time: DateTime<Utc>,
    pub tenant_id: Option<String>,
}

/// Backend applying many operations as one unit.
#[async_trait]
pub trait BundleService: Send + Sync {
    /// Applies the requests independently.
    async fn batch(&self, request: TransactionRequest) -> FhirResult<BundleServiceResponse>;

    /// Applies the requests atomically: all succeed or none are applied.
    async fn transaction(&self, request: TransactionRequest) -> FhirResult<BundleServiceResponse>;
}

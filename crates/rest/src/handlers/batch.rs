//! Transaction processing handler.
//!
//! Implements the FHIR [transaction interaction](https://hl7.org/fhir/http.html#transaction):
//! `POST [base]` with a Bundle of type "transaction"

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::SystemOperation;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::{FhirResource, RequestScope};
use crate::state::AppState;

/// Message for anything but a Bundle posted to the root.
pub const ROOT_ONLY_BUNDLES: &str = "This root path can only process a Bundle";

/// Handler for bundles posted to the server root.
///
/// # Request Body
///
/// A Bundle of type "transaction". Batch bundles are recognised and
/// refused.
///
/// # Response
///
/// - `200 OK` - `transaction-response` Bundle, one entry per request entry
/// - `400 Bad Request` - Invalid bundle, unsupported entry, or user error
/// - `403 Forbidden` - Bundle not authorized
/// - `404 Not Found` - Neither transactions nor batches are offered
pub async fn batch_handler(
    State(state): State<AppState>,
    scope: RequestScope,
    FhirResource(bundle): FhirResource,
) -> RestResult<Response> {
    let fhir = state.fhir();
    if !fhir.supports_system_operation(SystemOperation::Transaction)
        && !fhir.supports_system_operation(SystemOperation::Batch)
    {
        return Err(state.unsupported_system_operation(SystemOperation::Transaction));
    }
    if bundle.get("resourceType").and_then(|v| v.as_str()) != Some("Bundle") {
        return Err(RestError::bad_request(ROOT_ONLY_BUNDLES));
    }

    debug!(
        entries = bundle.get("entry").and_then(|e| e.as_array()).map_or(0, Vec::len),
        tenant = ?scope.tenant(),
        "Processing bundle"
    );
    let response = state.bundle_handler().process(&bundle, &scope).await?;
    Ok((StatusCode::OK, Json(response)).into_response())
}

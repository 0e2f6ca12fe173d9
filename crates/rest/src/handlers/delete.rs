//! Delete interaction handler.
//!
//! Implements the FHIR [delete interaction](https://hl7.org/fhir/http.html#delete):
//! `DELETE [base]/[type]/[id]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::TypeOperation;

use super::InstancePath;
use crate::error::RestResult;
use crate::extractors::RequestScope;
use crate::state::AppState;

/// Handler for the delete interaction.
///
/// # Response
///
/// - `200 OK` - OperationOutcome confirming the deletion
/// - `403 Forbidden` - Write not authorized for the existing resource
/// - `404 Not Found` - Resource does not exist
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::Delete)?;
    let outcome = handler.delete(&scope, &path.id).await?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

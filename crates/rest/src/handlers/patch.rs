//! Patch interaction handler.
//!
//! Implements the FHIR [patch interaction](https://hl7.org/fhir/http.html#patch):
//! `PATCH [base]/[type]/[id]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::TypeOperation;

use super::InstancePath;
use crate::error::RestResult;
use crate::extractors::{FhirResource, RequestScope};
use crate::state::AppState;

/// Handler for the patch interaction.
///
/// The body is applied by the persistence backend; it must carry the id
/// of the resource it patches.
pub async fn patch_handler(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    scope: RequestScope,
    FhirResource(body): FhirResource,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::Patch)?;
    let patched = handler.patch(&scope, &path.id, body).await?;
    Ok((StatusCode::OK, Json(patched)).into_response())
}

//! Update interaction handler.
//!
//! Implements the FHIR [update interaction](https://hl7.org/fhir/http.html#update):
//! `PUT [base]/[type]/[id]`

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

/// Handler for the update interaction.
///
/// # Response
///
/// - `200 OK` - Returns the new version
/// - `400 Bad Request` - Body id differs from the URL id, or invalid resource
/// - `404 Not Found` - Resource does not exist
pub async fn update_handler(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    scope: RequestScope,
    FhirResource(body): FhirResource,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::Update)?;
    let updated = handler.update(&scope, &path.id, body).await?;
    Ok((StatusCode::OK, Json(updated)).into_response())
}

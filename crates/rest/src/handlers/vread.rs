//! Version read interaction handler.
//!
//! Implements the FHIR [vread interaction](https://hl7.org/fhir/http.html#vread):
//! `GET [base]/[type]/[id]/_history/[vid]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::TypeOperation;

use super::VersionPath;
use crate::error::RestResult;
use crate::extractors::RequestScope;
use crate::responses::headers::ResourceHeaders;
use crate::state::AppState;

/// Handler for the vread interaction.
///
/// # Response
///
/// - `200 OK` - Version found, with `ETag` and `Last-Modified` headers
/// - `404 Not Found` - Resource or version does not exist
pub async fn vread_handler(
    State(state): State<AppState>,
    Path(path): Path<VersionPath>,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::VRead)?;
    let resource = handler.vread(&scope, &path.id, &path.vid).await?;
    let headers = ResourceHeaders::from_resource(&resource).to_header_map();
    Ok((StatusCode::OK, headers, Json(resource)).into_response())
}

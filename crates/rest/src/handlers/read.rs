//! Read interaction handler.
//!
//! Implements the FHIR [read interaction](https://hl7.org/fhir/http.html#read):
//! `GET [base]/[type]/[id]`

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
use crate::responses::headers::ResourceHeaders;
use crate::state::AppState;

/// Handler for the read interaction.
///
/// Reads a resource by type and ID, returning the current version as
/// filtered by the authorization backend.
///
/// # Response
///
/// - `200 OK` - Resource found, with `ETag` and `Last-Modified` headers
/// - `403 Forbidden` - The caller may not read the resource
/// - `404 Not Found` - Resource does not exist, or the type does not offer `read`
pub async fn read_handler(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::Read)?;
    let resource = handler.read(&scope, &path.id).await?;
    let headers = ResourceHeaders::from_resource(&resource).to_header_map();
    Ok((StatusCode::OK, headers, Json(resource)).into_response())
}

//! Create interaction handler.
//!
//! Implements the FHIR [create interaction](https://hl7.org/fhir/http.html#create):
//! `POST [base]/[type]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use helios_interface::TypeOperation;

use super::TypePath;
use crate::error::RestResult;
use crate::extractors::{FhirResource, RequestScope};
use crate::responses::headers::ResourceHeaders;
use crate::state::AppState;

/// Handler for the create interaction.
///
/// The body must be a resource of the route's type and pass every
/// configured validator.
///
/// # Response
///
/// - `201 Created` - Returns the stored resource
/// - `400 Bad Request` - Invalid resource
/// - `403 Forbidden` - Write not authorized
pub async fn create_handler(
    State(state): State<AppState>,
    Path(path): Path<TypePath>,
    scope: RequestScope,
    FhirResource(body): FhirResource,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::Create)?;
    let created = handler.create(&scope, body).await?;
    let headers = ResourceHeaders::from_resource(&created).to_header_map();
    Ok((StatusCode::CREATED, headers, Json(created)).into_response())
}

//! Search interaction handlers.
//!
//! Implements the FHIR [search interaction](https://hl7.org/fhir/http.html#search):
//! - `GET [base]/[type]?params` - Type-level search
//! - `POST [base]/[type]/_search` - Type-level search (POST)
//! - `GET [base]?params` and `GET [base]/_search?params` - System-level search
//!
//! Query parameters are handed to the search backend as ordered
//! key/value pairs; interpreting them is the backend's business.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, RawQuery, State},
    response::{IntoResponse, Response},
};
use helios_interface::core::{GlobalSearchRequest, QueryParams};
use helios_interface::{SystemOperation, TypeOperation};
use tracing::debug;

use super::resource::ensure_success;
use super::{TypePath, query_params};
use crate::error::RestResult;
use crate::extractors::RequestScope;
use crate::responses::bundle::{BundleType, search_bundle};
use crate::state::AppState;

/// Handler for type-level search via GET.
pub async fn search_get_handler(
    State(state): State<AppState>,
    Path(path): Path<TypePath>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::SearchType)?;
    let bundle = handler
        .type_search(&scope, query_params(raw.as_deref()))
        .await?;
    Ok(Json(bundle).into_response())
}

/// Handler for type-level search via POST.
///
/// Form-encoded body parameters follow the URL parameters.
pub async fn search_post_handler(
    State(state): State<AppState>,
    Path(path): Path<TypePath>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
    body: Bytes,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::SearchType)?;
    let params = merge_form_body(query_params(raw.as_deref()), &body);
    let bundle = handler.type_search(&scope, params).await?;
    Ok(Json(bundle).into_response())
}

/// Handler for system-level search.
///
/// Answers 404 unless `search-system` is among the system operations.
pub async fn search_system_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    state.ensure_system_operation(SystemOperation::SearchSystem)?;
    let params = query_params(raw.as_deref());
    debug!(params = params.len(), tenant = ?scope.tenant(), "Processing system search request");

    let authorization = state.authorization();
    let allowed_resource_types = authorization
        .get_allowed_resource_types_for_operation(
            &scope.identity,
            &scope.context,
            TypeOperation::SearchSystem,
        )
        .await?;
    let search_filters = authorization
        .get_search_filter_based_on_identity(
            &scope.identity,
            &scope.context,
            TypeOperation::SearchSystem,
            None,
            None,
            &scope.server_url,
        )
        .await?;

    let response = ensure_success(
        state
            .fhir()
            .system_search
            .global_search(GlobalSearchRequest {
                query_params: params.clone(),
                base_url: scope.server_url.clone(),
                allowed_resource_types,
                search_filters,
                tenant_id: scope.tenant_id.clone(),
            })
            .await?,
    )?;

    let bundle = search_bundle(
        &scope.server_url,
        &params,
        &response.result,
        BundleType::Searchset,
        None,
        None,
    );
    let filtered = authorization
        .authorize_and_filter_read_response(
            &scope.identity,
            &scope.context,
            TypeOperation::SearchSystem,
            bundle,
            &scope.server_url,
        )
        .await?;
    Ok(Json(filtered).into_response())
}

fn merge_form_body(mut params: QueryParams, body: &[u8]) -> QueryParams {
    params.extend(url::form_urlencoded::parse(body).into_owned());
    params
}

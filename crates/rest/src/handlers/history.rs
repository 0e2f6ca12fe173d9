//! History interaction handlers.
//!
//! Implements the FHIR [history interaction](https://hl7.org/fhir/http.html#history):
//! - `GET [base]/[type]/[id]/_history` - Instance history
//! - `GET [base]/[type]/_history` - Type history
//! - `GET [base]/_history` - System history

use axum::{
    Json,
    extract::{Path, RawQuery, State},
    response::{IntoResponse, Response},
};
use helios_interface::core::GlobalHistoryRequest;
use helios_interface::{SystemOperation, TypeOperation};
use tracing::debug;

use super::resource::ensure_success;
use super::{InstancePath, TypePath, query_params};
use crate::error::RestResult;
use crate::extractors::RequestScope;
use crate::responses::bundle::{BundleType, search_bundle};
use crate::state::AppState;

/// Handler for instance-level history.
pub async fn history_instance_handler(
    State(state): State<AppState>,
    Path(path): Path<InstancePath>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::HistoryInstance)?;
    let bundle = handler
        .instance_history(&scope, &path.id, query_params(raw.as_deref()))
        .await?;
    Ok(Json(bundle).into_response())
}

/// Handler for type-level history.
pub async fn history_type_handler(
    State(state): State<AppState>,
    Path(path): Path<TypePath>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    let handler = state.resource_handler(&path.resource_type, TypeOperation::HistoryType)?;
    let bundle = handler
        .type_history(&scope, query_params(raw.as_deref()))
        .await?;
    Ok(Json(bundle).into_response())
}

/// Handler for system-level history.
///
/// Answers 404 unless `history-system` is among the system operations.
pub async fn history_system_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    state.ensure_system_operation(SystemOperation::HistorySystem)?;
    let params = query_params(raw.as_deref());
    debug!(tenant = ?scope.tenant(), "Processing system history request");

    let authorization = state.authorization();
    let search_filters = authorization
        .get_search_filter_based_on_identity(
            &scope.identity,
            &scope.context,
            TypeOperation::HistorySystem,
            None,
            None,
            &scope.server_url,
        )
        .await?;

    let response = ensure_success(
        state
            .fhir()
            .system_history
            .global_history(GlobalHistoryRequest {
                query_params: params.clone(),
                base_url: scope.server_url.clone(),
                search_filters,
                tenant_id: scope.tenant_id.clone(),
            })
            .await?,
    )?;

    let bundle = search_bundle(
        &scope.server_url,
        &params,
        &response.result,
        BundleType::History,
        None,
        None,
    );
    let filtered = authorization
        .authorize_and_filter_read_response(
            &scope.identity,
            &scope.context,
            TypeOperation::HistorySystem,
            bundle,
            &scope.server_url,
        )
        .await?;
    Ok(Json(filtered).into_response())
}

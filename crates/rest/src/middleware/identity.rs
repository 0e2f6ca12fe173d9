//! Caller identity middleware.
//!
//! Maps every request to the FHIR interaction it performs (a mounted
//! operation definition names its own), hands the bearer
//! token to the configured [`Authorization`](helios_interface::core::Authorization)
//! backend and stores the returned [`UserIdentity`] in request extensions.

use axum::{
    extract::{Request, State},
    http::{Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use helios_interface::{Operation, SystemOperation, TypeOperation, UserIdentity};
use tracing::{debug, warn};

use super::server_url::{ServerUrl, resolve_server_url};
use super::tenant_prefix::{request_path, split_tenant_prefix};
use crate::error::RestError;
use crate::state::AppState;

/// The interaction a request performs, as passed to token verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInformation {
    /// The interaction.
    pub operation: Operation,
    /// Resource type addressed, if any.
    pub resource_type: Option<String>,
    /// Resource id addressed, if any.
    pub id: Option<String>,
    /// Version id addressed, if any.
    pub vid: Option<String>,
}

impl RequestInformation {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            resource_type: None,
            id: None,
            vid: None,
        }
    }

    fn of_type(operation: TypeOperation, parts: &[&str]) -> Self {
        let at = |i: usize| parts.get(i).map(|s| s.to_string());
        Self {
            operation: Operation::Type(operation),
            resource_type: at(0),
            id: at(1),
            vid: at(3),
        }
    }
}

/// Maps `method` and `path` (tenant prefix already removed) to an interaction.
pub fn get_request_information(method: &Method, path: &str) -> RequestInformation {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let has_history = parts.contains(&"_history");
    let has_search = parts.contains(&"_search");

    match *method {
        Method::PUT => RequestInformation::of_type(TypeOperation::Update, &parts),
        Method::PATCH => RequestInformation::of_type(TypeOperation::Patch, &parts),
        Method::DELETE => RequestInformation::of_type(TypeOperation::Delete, &parts),
        Method::GET if has_history => match parts.len() {
            1 => RequestInformation::new(Operation::System(SystemOperation::HistorySystem)),
            2 => RequestInformation::of_type(TypeOperation::HistoryType, &parts[..1]),
            3 => RequestInformation::of_type(TypeOperation::HistoryInstance, &parts),
            _ => RequestInformation::of_type(TypeOperation::VRead, &parts),
        },
        Method::GET => match parts.len() {
            0 => RequestInformation::new(Operation::System(SystemOperation::SearchSystem)),
            1 if has_search => {
                RequestInformation::new(Operation::System(SystemOperation::SearchSystem))
            }
            1 => RequestInformation::of_type(TypeOperation::SearchType, &parts),
            _ if has_search => RequestInformation::of_type(TypeOperation::SearchType, &parts[..1]),
            _ => RequestInformation::of_type(TypeOperation::Read, &parts),
        },
        Method::POST if parts.is_empty() => {
            RequestInformation::new(Operation::System(SystemOperation::Transaction))
        }
        Method::POST if has_search => {
            RequestInformation::of_type(TypeOperation::SearchType, &parts[..1])
        }
        _ => RequestInformation::of_type(TypeOperation::Create, &parts[..parts.len().min(1)]),
    }
}

/// Removes the `Bearer ` scheme from an `Authorization` header value.
pub fn clean_auth_header(value: Option<&str>) -> &str {
    value
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .unwrap_or("")
}

/// Middleware verifying the access token of every request.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let server_url = match request.extensions().get::<ServerUrl>() {
        Some(url) => url.url.clone(),
        None => resolve_server_url(&state, &request).url,
    };
    let full_path = request_path(&request);
    let (_, path) = split_tenant_prefix(&full_path);
    let info = match state.operations().get_operation(request.method(), path) {
        Some(operation) => operation.request_information.clone(),
        None => get_request_information(request.method(), path),
    };

    let token = clean_auth_header(
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok()),
    )
    .to_string();

    let verified = state
        .authorization()
        .verify_access_token(
            &token,
            info.operation,
            info.resource_type.as_deref(),
            info.id.as_deref(),
            info.vid.as_deref(),
            &server_url,
        )
        .await;

    match verified {
        Ok(identity) => {
            debug!(operation = %info.operation, "Verified access token");
            request.extensions_mut().insert::<UserIdentity>(identity);
            next.run(request).await
        }
        Err(e) => {
            warn!(operation = %info.operation, error = %e, "Access token verification failed");
            RestError::unauthorized(e.to_string()).into_response()
        }
    }
}

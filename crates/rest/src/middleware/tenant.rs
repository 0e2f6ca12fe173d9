//! Tenant resolution middleware.
//!
//! Runs after [`identity_middleware`](super::identity::identity_middleware)
//! when multi-tenancy is enabled: resolves the tenant from the verified
//! identity and the `/tenant/{id}` URL prefix, stores the
//! [`ResolvedTenant`] in request extensions and attaches the tenant to the
//! [`UserIdentity`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use helios_interface::UserIdentity;
use tracing::{debug, warn};

use super::server_url::{ServerUrl, resolve_server_url};
use super::tenant_prefix::{request_path, split_tenant_prefix};
use crate::error::RestError;
use crate::state::AppState;
use crate::tenant::ResolvedTenant;

/// Resolves the tenant of `request` for `identity`.
pub fn resolve_request_tenant(
    state: &AppState,
    request: &Request,
    identity: &UserIdentity,
) -> Result<ResolvedTenant, RestError> {
    let base = match request.extensions().get::<ServerUrl>() {
        Some(url) => url.base.clone(),
        None => resolve_server_url(state, request).base,
    };
    let full_path = request_path(request);
    let path_tenant = if state.config().use_tenant_specific_url {
        split_tenant_prefix(&full_path).0
    } else {
        None
    };

    state
        .tenants()
        .resolve(identity, path_tenant, &base)
        .map_err(|e| {
            warn!(error = %e, path_tenant = ?path_tenant, "Tenant resolution failed");
            RestError::from(e)
        })
}

/// Middleware binding every request to a tenant.
///
/// A no-op when multi-tenancy is disabled.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.config().enable_multi_tenancy {
        return next.run(request).await;
    }

    let Some(mut identity) = request.extensions().get::<UserIdentity>().cloned() else {
        return RestError::unauthorized("Request carries no verified identity").into_response();
    };

    match resolve_request_tenant(&state, &request, &identity) {
        Ok(resolved) => {
            debug!(tenant = %resolved.tenant_id, source = %resolved.source, "Bound request to tenant");
            identity.set_tenant_id(&resolved.tenant_id);
            request.extensions_mut().insert(identity);
            request.extensions_mut().insert(resolved);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

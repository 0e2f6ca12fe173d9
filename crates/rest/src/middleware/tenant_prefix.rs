//! Tenant URL prefix handling.
//!
//! With tenant-specific URLs enabled, every route is also served below
//! `/tenant/{tenant_id}`. The middleware stack reads the tenant and the
//! remaining path from the full request URI with [`split_tenant_prefix`].

use axum::extract::{OriginalUri, Request};

/// First path segment of the tenant prefix.
pub const TENANT_SEGMENT: &str = "tenant";

/// Splits `/tenant/{id}/rest` into `(Some(id), "/rest")`.
///
/// Paths without the prefix are returned unchanged. The bare prefix
/// `/tenant/{id}` maps to `/`.
pub fn split_tenant_prefix(path: &str) -> (Option<&str>, &str) {
    let Some(rest) = path
        .strip_prefix('/')
        .and_then(|p| p.strip_prefix(TENANT_SEGMENT))
        .and_then(|p| p.strip_prefix('/'))
    else {
        return (None, path);
    };

    let (tenant, remaining) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    if tenant.is_empty() {
        return (None, path);
    }
    (Some(tenant), remaining)
}

/// Returns the path the client sent, before any router nesting.
pub fn request_path(request: &Request) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

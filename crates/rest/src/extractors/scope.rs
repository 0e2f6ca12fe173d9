//! Per-request caller scope.
//!
//! The middleware stack attaches the verified [`UserIdentity`], the
//! [`ServerUrl`] and, under multi-tenancy, the [`ResolvedTenant`] to the
//! request extensions. [`RequestScope`] collects them, together with a
//! [`RequestContext`] snapshot of the request, for handlers.

use std::collections::BTreeMap;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use helios_interface::core::ValidatorContext;
use helios_interface::{RequestContext, TypeOperation, UserIdentity};

use crate::error::RestError;
use crate::middleware::ServerUrl;
use crate::tenant::ResolvedTenant;

/// Everything a handler needs to know about the caller.
///
/// # Example
///
/// ```rust,ignore
/// use helios_rest::extractors::RequestScope;
///
/// async fn handler(scope: RequestScope) {
///     println!("{} on tenant {:?}", scope.server_url, scope.tenant_id);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Claims of the verified caller, tenant attached.
    pub identity: UserIdentity,
    /// Snapshot of the request for authorization checks.
    pub context: RequestContext,
    /// Base URL of the request, tenant prefix included.
    pub server_url: String,
    /// Tenant resolved for the request.
    pub tenant_id: Option<String>,
}

impl RequestScope {
    /// Returns the tenant as a borrowed string.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Builds the validator context for `operation`.
    pub fn validator_context(&self, operation: TypeOperation) -> ValidatorContext {
        ValidatorContext {
            tenant_id: self.tenant_id.clone(),
            type_operation: Some(operation),
        }
    }
}

/// Snapshots the request for authorization backends.
///
/// Header names are lower-cased; the `Authorization` header is not copied.
pub fn request_context(parts: &Parts) -> RequestContext {
    let headers: BTreeMap<String, String> = parts
        .headers
        .iter()
        .filter(|(name, _)| *name != header::AUTHORIZATION)
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    RequestContext {
        verb: parts.method.as_str().to_string(),
        url: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string()),
        host_name: parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        headers,
    }
}

impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = RestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<UserIdentity>()
            .cloned()
            .ok_or_else(|| RestError::unauthorized("Request carries no verified identity"))?;
        let server_url = parts
            .extensions
            .get::<ServerUrl>()
            .map(|s| s.url.clone())
            .ok_or_else(|| RestError::internal("Server URL was not resolved for the request"))?;
        let tenant_id = parts
            .extensions
            .get::<ResolvedTenant>()
            .map(|t| t.tenant_id.clone());

        Ok(Self {
            identity,
            context: request_context(parts),
            server_url,
            tenant_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_request_context_drops_authorization() {
        let parts = parts(
            Request::builder()
                .method("GET")
                .uri("/Patient?name=smith")
                .header("Host", "fhir.example.com")
                .header("Authorization", "Bearer secret")
                .header("X-Custom", "1")
                .body(())
                .unwrap(),
        );

        let context = request_context(&parts);
        assert_eq!(context.verb, "GET");
        assert_eq!(context.url, "/Patient?name=smith");
        assert_eq!(context.host_name.as_deref(), Some("fhir.example.com"));
        assert_eq!(context.headers.get("x-custom").map(String::as_str), Some("1"));
        assert!(!context.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_scope_requires_identity() {
        let mut parts = parts(Request::builder().uri("/Patient").body(()).unwrap());
        let err = RequestScope::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, RestError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_scope_collects_extensions() {
        let mut parts = parts(Request::builder().uri("/Patient").body(()).unwrap());
        parts
            .extensions
            .insert(UserIdentity::from_value(json!({ "sub": "fake" })));
        parts.extensions.insert(ServerUrl {
            base: "https://fhir.example.com".to_string(),
            url: "https://fhir.example.com/tenant/t1".to_string(),
        });

        let scope = RequestScope::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(scope.server_url, "https://fhir.example.com/tenant/t1");
        assert!(scope.tenant().is_none());

        let ctx = scope.validator_context(TypeOperation::Create);
        assert_eq!(ctx.type_operation, Some(TypeOperation::Create));
    }
}

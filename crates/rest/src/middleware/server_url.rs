//! Per-request server URL.
//!
//! Every response that links back to the server (bundle self links,
//! `fullUrl`s, token audiences) uses the URL computed here:
//!
//! 1. The configured base URL, without a trailing `/`.
//! 2. With `dynamic_host_name`, the host replaced by the request `Host`.
//! 3. With tenant-specific URLs, `/tenant/{id}` appended when the request
//!    came in below that prefix.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use url::Url;

use super::tenant_prefix::{TENANT_SEGMENT, request_path, split_tenant_prefix};
use crate::state::AppState;

/// Server URL of the current request, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerUrl {
    /// Server URL without any tenant prefix.
    pub base: String,
    /// Server URL the request was addressed to.
    pub url: String,
}

/// Replaces the host (and port) of `base` with the `Host` header value.
///
/// Falls back to `base` when either value cannot be parsed.
pub fn with_request_host(base: &str, host: &str) -> String {
    let Ok(mut url) = Url::parse(base) else {
        return base.to_string();
    };

    let (hostname, port) = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
            (name, port.parse::<u16>().ok())
        }
        _ => (host, None),
    };
    if url.set_host(Some(hostname)).is_err() || url.set_port(port).is_err() {
        warn!(host = %host, "Ignoring unusable Host header");
        return base.to_string();
    }

    url.as_str().trim_end_matches('/').to_string()
}

/// Computes the [`ServerUrl`] of `request`.
pub fn resolve_server_url(state: &AppState, request: &Request) -> ServerUrl {
    let config = state.config();
    let mut base = config.server_url().to_string();
    if config.dynamic_host_name {
        if let Some(host) = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
        {
            base = with_request_host(&base, host);
        }
    }

    let url = if config.use_tenant_specific_url {
        match split_tenant_prefix(&request_path(request)) {
            (Some(tenant), _) => format!("{}/{}/{}", base, TENANT_SEGMENT, tenant),
            (None, _) => base.clone(),
        }
    } else {
        base.clone()
    };

    ServerUrl { base, url }
}

/// Middleware storing the [`ServerUrl`] in request extensions.
pub async fn server_url_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let server_url = resolve_server_url(&state, &request);
    debug!(server_url = %server_url.url, "Resolved server URL");
    request.extensions_mut().insert(server_url);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::profile::FhirConfig;
    use axum::body::Body;
    use helios_interface::FhirVersion;
    use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
    use std::sync::Arc;

    fn state(config: ServerConfig) -> AppState {
        let fhir = FhirConfig::from_backend(
            FhirVersion::R4,
            Arc::new(MemoryBackend::new()),
            Arc::new(PassThroughAuthorization::default()),
        );
        AppState::new(fhir, config)
    }

    fn request(path: &str, host: &str) -> Request {
        Request::builder()
            .uri(path)
            .header("Host", host)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_with_request_host() {
        assert_eq!(
            with_request_host("https://fhir.example.com/", "api.other.org"),
            "https://api.other.org"
        );
        assert_eq!(
            with_request_host("https://fhir.example.com/r4", "localhost:8080"),
            "https://localhost:8080/r4"
        );
        assert_eq!(with_request_host("not a url", "api.other.org"), "not a url");
    }

    #[test]
    fn test_static_server_url() {
        let state = state(ServerConfig::for_testing());
        let resolved = resolve_server_url(&state, &request("/Patient", "api.other.org"));
        assert_eq!(resolved.url, "https://fhir.example.com");
        assert_eq!(resolved.base, resolved.url);
    }

    #[test]
    fn test_dynamic_host_name() {
        let state = state(ServerConfig {
            dynamic_host_name: true,
            ..ServerConfig::for_testing()
        });
        let resolved = resolve_server_url(&state, &request("/Patient", "api.other.org"));
        assert_eq!(resolved.url, "https://api.other.org");
    }

    #[test]
    fn test_tenant_specific_url() {
        let state = state(ServerConfig {
            enable_multi_tenancy: true,
            use_tenant_specific_url: true,
            ..ServerConfig::for_testing()
        });
        let resolved =
            resolve_server_url(&state, &request("/tenant/t1/Patient", "fhir.example.com"));
        assert_eq!(resolved.base, "https://fhir.example.com");
        assert_eq!(resolved.url, "https://fhir.example.com/tenant/t1");

        let resolved = resolve_server_url(&state, &request("/Patient", "fhir.example.com"));
        assert_eq!(resolved.url, "https://fhir.example.com");
    }
}

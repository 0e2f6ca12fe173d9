//! Server configuration for the FHIR REST façade.
//!
//! This module provides the HTTP-level configuration of the server, supporting
//! both programmatic configuration and environment variable overrides. The
//! FHIR profile (resource types, operations, backends) lives in
//! [`crate::profile`].
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REST_SERVER_PORT` | 8080 | Server port |
//! | `REST_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `REST_LOG_LEVEL` | info | Log level |
//! | `REST_MAX_BODY_SIZE` | 6291456 | Max request body (bytes) |
//! | `REST_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `REST_ENABLE_CORS` | true | Enable CORS |
//! | `REST_CORS_ORIGINS` | * | Allowed origins |
//! | `REST_CORS_METHODS` | GET,POST,PUT,PATCH,DELETE,OPTIONS | Allowed methods |
//! | `REST_CORS_HEADERS` | Content-Type,Authorization,Accept | Allowed headers |
//! | `REST_BASE_URL` | http://localhost:8080 | Server URL used in links and audience claims |
//! | `REST_DYNAMIC_HOST_NAME` | false | Use the request `Host` header in server URLs |
//! | `REST_MAX_BUNDLE_ENTRIES` | 25 | Entry ceiling for transaction bundles |
//! | `REST_ENABLE_MULTI_TENANCY` | false | Resolve a tenant for every request |
//! | `REST_USE_TENANT_SPECIFIC_URL` | false | Also serve routes below `/tenant/{id}` |
//! | `REST_TENANT_ID_CLAIM_PATH` | custom:tenantId | Claim carrying the tenant |
//! | `REST_TENANT_ID_CLAIM_VALUE_PREFIX` | (none) | Prefix stripped from claim values |
//! | `REST_GRANT_ACCESS_ALL_TENANTS_SCOPE` | (none) | Scope granting every tenant |
//!
//! # Example
//!
//! ```rust
//! use helios_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     port: 3000,
//!     enable_multi_tenancy: true,
//!     use_tenant_specific_url: true,
//!     ..Default::default()
//! };
//! assert!(config.multitenancy().use_tenant_specific_url);
//! ```

use clap::Parser;

/// Entry ceiling applied to transaction bundles unless configured otherwise.
pub const DEFAULT_MAX_BUNDLE_ENTRIES: usize = 25;

/// Server configuration for the FHIR REST façade.
#[derive(Debug, Clone, Parser)]
#[command(name = "hfs")]
#[command(about = "FHIR RESTful façade with bundle transactions and multi-tenancy")]
pub struct ServerConfig {
    /// Port to listen on.
    #[arg(short, long, env = "REST_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "REST_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "REST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Maximum request body size in bytes.
    #[arg(long, env = "REST_MAX_BODY_SIZE", default_value = "6291456")]
    pub max_body_size: usize,

    /// Request timeout in seconds.
    #[arg(long, env = "REST_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "REST_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "REST_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Allowed CORS methods (comma-separated, or * for all).
    #[arg(
        long,
        env = "REST_CORS_METHODS",
        default_value = "GET,POST,PUT,PATCH,DELETE,OPTIONS"
    )]
    pub cors_methods: String,

    /// Allowed CORS headers (comma-separated, or * for all).
    #[arg(
        long,
        env = "REST_CORS_HEADERS",
        default_value = "Content-Type,Authorization,Accept"
    )]
    pub cors_headers: String,

    /// Base URL for the server (used in Bundle links and audience claims).
    #[arg(long, env = "REST_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Replace the host of `base_url` with the request's `Host` header.
    #[arg(long, env = "REST_DYNAMIC_HOST_NAME", default_value = "false")]
    pub dynamic_host_name: bool,

    /// Maximum number of entries accepted in a transaction bundle.
    #[arg(long, env = "REST_MAX_BUNDLE_ENTRIES", default_value = "25")]
    pub max_bundle_entries: usize,

    /// Resolve and enforce a tenant for every request.
    #[arg(long, env = "REST_ENABLE_MULTI_TENANCY", default_value = "false")]
    pub enable_multi_tenancy: bool,

    /// Serve every route below `/tenant/{tenant_id}` as well.
    #[arg(long, env = "REST_USE_TENANT_SPECIFIC_URL", default_value = "false")]
    pub use_tenant_specific_url: bool,

    /// Dot path of the token claim carrying the tenant id.
    #[arg(long, env = "REST_TENANT_ID_CLAIM_PATH", default_value = "custom:tenantId")]
    pub tenant_id_claim_path: String,

    /// Prefix stripped from tenant claim values (e.g. `tenantprefix:`).
    #[arg(long, env = "REST_TENANT_ID_CLAIM_VALUE_PREFIX")]
    pub tenant_id_claim_value_prefix: Option<String>,

    /// Scope that grants access to every tenant.
    #[arg(long, env = "REST_GRANT_ACCESS_ALL_TENANTS_SCOPE")]
    pub grant_access_all_tenants_scope: Option<String>,
}

/// Multi-tenancy settings, derived from [`ServerConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultitenancyConfig {
    /// Resolve and enforce a tenant for every request.
    pub enable_multi_tenancy: bool,
    /// Serve every route below `/tenant/{tenant_id}` as well.
    pub use_tenant_specific_url: bool,
    /// Dot path of the token claim carrying the tenant id.
    pub tenant_id_claim_path: String,
    /// Prefix stripped from tenant claim values.
    pub tenant_id_claim_value_prefix: Option<String>,
    /// Scope that grants access to every tenant.
    pub grant_access_all_tenants_scope: Option<String>,
}

impl Default for MultitenancyConfig {
    fn default() -> Self {
        Self {
            enable_multi_tenancy: false,
            use_tenant_specific_url: false,
            tenant_id_claim_path: "custom:tenantId".to_string(),
            tenant_id_claim_value_prefix: None,
            grant_access_all_tenants_scope: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let multitenancy = MultitenancyConfig::default();
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            max_body_size: 6 * 1024 * 1024, // 6MB
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            cors_methods: "GET,POST,PUT,PATCH,DELETE,OPTIONS".to_string(),
            cors_headers: "Content-Type,Authorization,Accept".to_string(),
            base_url: "http://localhost:8080".to_string(),
            dynamic_host_name: false,
            max_bundle_entries: DEFAULT_MAX_BUNDLE_ENTRIES,
            enable_multi_tenancy: multitenancy.enable_multi_tenancy,
            use_tenant_specific_url: multitenancy.use_tenant_specific_url,
            tenant_id_claim_path: multitenancy.tenant_id_claim_path,
            tenant_id_claim_value_prefix: multitenancy.tenant_id_claim_value_prefix,
            grant_access_all_tenants_scope: multitenancy.grant_access_all_tenants_scope,
        }
    }
}

impl ServerConfig {
    /// Creates a new ServerConfig from environment variables.
    pub fn from_env() -> Self {
        Self::try_parse().unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the configured server URL without a trailing slash.
    pub fn server_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the multi-tenancy settings.
    pub fn multitenancy(&self) -> MultitenancyConfig {
        MultitenancyConfig {
            enable_multi_tenancy: self.enable_multi_tenancy,
            use_tenant_specific_url: self.use_tenant_specific_url,
            tenant_id_claim_path: self.tenant_id_claim_path.clone(),
            tenant_id_claim_value_prefix: self.tenant_id_claim_value_prefix.clone(),
            grant_access_all_tenants_scope: self.grant_access_all_tenants_scope.clone(),
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("Port cannot be 0".to_string());
        }

        if self.max_body_size == 0 {
            errors.push("Max body size cannot be 0".to_string());
        }

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.max_bundle_entries == 0 {
            errors.push("Max bundle entries cannot be 0".to_string());
        }

        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Base URL '{}' is not a valid URL", self.base_url));
        }

        if self.use_tenant_specific_url && !self.enable_multi_tenancy {
            errors.push("Tenant specific URLs require multi-tenancy to be enabled".to_string());
        }

        if self.enable_multi_tenancy && self.tenant_id_claim_path.trim().is_empty() {
            errors.push("Tenant id claim path cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    pub fn for_testing() -> Self {
        Self {
            port: 0, // Let OS assign port
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            base_url: "https://fhir.example.com".to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_bundle_entries, 25);
        assert!(!config.enable_multi_tenancy);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            host: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_server_url_trims_trailing_slash() {
        let config = ServerConfig {
            base_url: "https://fhir.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.server_url(), "https://fhir.example.com");
    }

    #[test]
    fn test_validate_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port_and_entries() {
        let config = ServerConfig {
            port: 0,
            max_bundle_entries: 0,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Port")));
        assert!(errors.iter().any(|e| e.contains("bundle entries")));
    }

    #[test]
    fn test_validate_tenant_url_requires_multitenancy() {
        let config = ServerConfig {
            use_tenant_specific_url: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_base_url() {
        let config = ServerConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multitenancy_projection() {
        let config = ServerConfig {
            enable_multi_tenancy: true,
            tenant_id_claim_path: "cognito:groups".to_string(),
            tenant_id_claim_value_prefix: Some("tenantprefix:".to_string()),
            grant_access_all_tenants_scope: Some("tenants/all".to_string()),
            ..Default::default()
        };
        let mt = config.multitenancy();
        assert!(mt.enable_multi_tenancy);
        assert_eq!(mt.tenant_id_claim_path, "cognito:groups");
        assert_eq!(mt.tenant_id_claim_value_prefix.as_deref(), Some("tenantprefix:"));
        assert_eq!(mt.grant_access_all_tenants_scope.as_deref(), Some("tenants/all"));
    }

    #[test]
    fn test_for_testing() {
        let config = ServerConfig::for_testing();
        assert_eq!(config.port, 0);
        assert!(!config.enable_cors);
    }
}

//! Tenant resolution from token claims and the URL.
//!
//! Provides the [`TenantResolver`] which derives the tenant of a request
//! from the caller's identity using multiple configurable sources.

use helios_interface::UserIdentity;
use serde_json::Value;
use tracing::debug;

use crate::config::MultitenancyConfig;

use super::DEFAULT_TENANT;
use super::source::TenantSource;
use super::validation::{TenantError, TenantValidator};

/// Result of resolving a tenant for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant {
    /// The resolved tenant ID.
    pub tenant_id: String,
    /// The source from which the tenant was resolved.
    pub source: TenantSource,
    /// All sources that provided a tenant ID (for validation).
    pub all_sources: Vec<(TenantSource, String)>,
}

impl ResolvedTenant {
    /// Returns the tenant ID as a string reference.
    pub fn tenant_id_str(&self) -> &str {
        &self.tenant_id
    }
}

/// Trait for extracting a tenant candidate from one claim source.
pub trait TenantSourceExtractor: Send + Sync {
    /// Attempts to extract a tenant ID from the caller's identity.
    ///
    /// `path_tenant_id` is the tenant named by the URL, used to pick a
    /// member of multi-valued claims.
    fn extract(
        &self,
        identity: &UserIdentity,
        path_tenant_id: Option<&str>,
        server_url: &str,
    ) -> Result<Option<String>, TenantError>;

    /// Returns the source type this extractor handles.
    fn source_type(&self) -> TenantSource;
}

/// Extracts the tenant from the configured custom claim.
#[derive(Debug, Clone)]
pub struct ClaimTenantExtractor {
    claim_path: String,
    value_prefix: Option<String>,
}

impl ClaimTenantExtractor {
    /// Creates an extractor reading `claim_path`, stripping `value_prefix`.
    pub fn new(claim_path: impl Into<String>, value_prefix: Option<String>) -> Self {
        Self {
            claim_path: claim_path.into(),
            value_prefix,
        }
    }

    /// Applies the prefix rule: with a prefix configured, only prefixed
    /// values count.
    fn strip(&self, value: &str) -> Option<String> {
        match &self.value_prefix {
            Some(prefix) => value.strip_prefix(prefix.as_str()).map(String::from),
            None => Some(value.to_string()),
        }
    }
}

impl TenantSourceExtractor for ClaimTenantExtractor {
    fn extract(
        &self,
        identity: &UserIdentity,
        path_tenant_id: Option<&str>,
        _server_url: &str,
    ) -> Result<Option<String>, TenantError> {
        let candidate = match identity.get(&self.claim_path) {
            Some(Value::String(value)) => self.strip(value),
            Some(Value::Array(values)) => {
                // A list only identifies a tenant when the URL picks one of its members
                let Some(path_tenant) = path_tenant_id else {
                    return Ok(None);
                };
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|v| self.strip(v))
                    .find(|v| v == path_tenant)
            }
            _ => None,
        };
        Ok(candidate)
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Claim
    }
}

/// Extracts the tenant from `aud` values of the form
/// `{server_url}/tenant/{id}`.
#[derive(Debug, Clone, Default)]
pub struct AudienceTenantExtractor;

impl AudienceTenantExtractor {
    /// Parses one audience value.
    pub fn tenant_from_audience(audience: &str, server_url: &str) -> Option<String> {
        let prefix = format!("{}/tenant/", server_url.trim_end_matches('/'));
        let tenant = audience.strip_prefix(&prefix)?;
        (!tenant.is_empty() && !tenant.contains('/')).then(|| tenant.to_string())
    }
}

impl TenantSourceExtractor for AudienceTenantExtractor {
    fn extract(
        &self,
        identity: &UserIdentity,
        _path_tenant_id: Option<&str>,
        server_url: &str,
    ) -> Result<Option<String>, TenantError> {
        match identity.get("aud") {
            Some(Value::String(aud)) => Ok(Self::tenant_from_audience(aud, server_url)),
            Some(Value::Array(values)) => {
                let mut tenants: Vec<String> = values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|aud| Self::tenant_from_audience(aud, server_url))
                    .collect();
                tenants.sort();
                tenants.dedup();
                match tenants.len() {
                    0 => Ok(None),
                    1 => Ok(tenants.pop()),
                    _ => Err(TenantError::AmbiguousAudience(tenants)),
                }
            }
            _ => Ok(None),
        }
    }

    fn source_type(&self) -> TenantSource {
        TenantSource::Audience
    }
}

/// Resolves the tenant of a request.
pub struct TenantResolver {
    config: MultitenancyConfig,
    extractors: Vec<Box<dyn TenantSourceExtractor>>,
}

impl TenantResolver {
    /// Creates a new TenantResolver based on the multitenancy configuration.
    pub fn new(config: MultitenancyConfig) -> Self {
        // Custom claim first so it is reported as the primary source
        let extractors: Vec<Box<dyn TenantSourceExtractor>> = vec![
            Box::new(ClaimTenantExtractor::new(
                config.tenant_id_claim_path.clone(),
                config.tenant_id_claim_value_prefix.clone(),
            )),
            Box::new(AudienceTenantExtractor),
        ];
        Self { config, extractors }
    }

    /// Returns the configuration this resolver was built from.
    pub fn config(&self) -> &MultitenancyConfig {
        &self.config
    }

    /// Resolves the tenant of a request.
    ///
    /// # Arguments
    ///
    /// * `identity` - Claims of the caller
    /// * `path_tenant_id` - Tenant named by the URL, if any
    /// * `server_url` - Configured server URL, used to parse `aud`
    pub fn resolve(
        &self,
        identity: &UserIdentity,
        path_tenant_id: Option<&str>,
        server_url: &str,
    ) -> Result<ResolvedTenant, TenantError> {
        if let Some(path_tenant) = path_tenant_id {
            if path_tenant == DEFAULT_TENANT {
                return Ok(Self::accept_path(path_tenant, TenantSource::UrlPath));
            }
            if let Some(scope) = &self.config.grant_access_all_tenants_scope {
                if identity.has_scope(scope) {
                    TenantValidator::validate_format(path_tenant)?;
                    return Ok(Self::accept_path(path_tenant, TenantSource::AllTenantsScope));
                }
            }
        }

        let mut all_sources = Vec::new();
        for extractor in &self.extractors {
            if let Some(tenant_id) = extractor.extract(identity, path_tenant_id, server_url)? {
                all_sources.push((extractor.source_type(), tenant_id));
            }
        }

        let Some((source, tenant_id)) = all_sources.first().cloned() else {
            return Err(TenantError::MissingTenant);
        };
        let resolved = ResolvedTenant {
            tenant_id,
            source,
            all_sources,
        };

        TenantValidator::validate_consistency(&resolved)?;
        TenantValidator::validate_format(&resolved.tenant_id)?;
        TenantValidator::validate_path(&resolved.tenant_id, path_tenant_id)?;

        debug!(tenant = %resolved.tenant_id, source = %resolved.source, "Resolved tenant");
        Ok(resolved)
    }

    fn accept_path(path_tenant: &str, source: TenantSource) -> ResolvedTenant {
        ResolvedTenant {
            tenant_id: path_tenant.to_string(),
            source,
            all_sources: vec![(source, path_tenant.to_string())],
        }
    }
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(MultitenancyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERVER_URL: &str = "https://fhir.example.com";

    fn config() -> MultitenancyConfig {
        MultitenancyConfig {
            enable_multi_tenancy: true,
            use_tenant_specific_url: true,
            tenant_id_claim_path: "tenantId".to_string(),
            tenant_id_claim_value_prefix: None,
            grant_access_all_tenants_scope: Some("tenants/all".to_string()),
        }
    }

    fn identity(claims: Value) -> UserIdentity {
        UserIdentity::from_value(claims)
    }

    #[test]
    fn test_claim_matches_path() {
        let resolver = TenantResolver::new(config());
        let resolved = resolver
            .resolve(&identity(json!({"tenantId": "t1"})), Some("t1"), SERVER_URL)
            .unwrap();
        assert_eq!(resolved.tenant_id_str(), "t1");
        assert_eq!(resolved.source, TenantSource::Claim);
    }

    #[test]
    fn test_claim_without_path() {
        let resolver = TenantResolver::new(config());
        let resolved = resolver
            .resolve(&identity(json!({"tenantId": "t1"})), None, SERVER_URL)
            .unwrap();
        assert_eq!(resolved.tenant_id, "t1");
    }

    #[test]
    fn test_claim_does_not_match_path() {
        let resolver = TenantResolver::new(config());
        let err = resolver
            .resolve(&identity(json!({"tenantId": "t1"})), Some("t2"), SERVER_URL)
            .unwrap_err();
        assert!(matches!(err, TenantError::PathMismatch { .. }));
    }

    #[test]
    fn test_default_tenant_bypasses_claims() {
        let resolver = TenantResolver::new(config());
        let resolved = resolver
            .resolve(&identity(json!({"tenantId": "t1"})), Some("DEFAULT"), SERVER_URL)
            .unwrap();
        assert_eq!(resolved.tenant_id, "DEFAULT");
        assert_eq!(resolved.source, TenantSource::UrlPath);

        let resolved = resolver
            .resolve(&identity(json!({})), Some("DEFAULT"), SERVER_URL)
            .unwrap();
        assert_eq!(resolved.tenant_id, "DEFAULT");
    }

    #[test]
    fn test_all_tenants_scope_grants_path_tenant() {
        let resolver = TenantResolver::new(config());
        let caller = identity(json!({"tenantId": "t1", "scope": "openid tenants/all"}));
        let resolved = resolver.resolve(&caller, Some("t2"), SERVER_URL).unwrap();
        assert_eq!(resolved.tenant_id, "t2");
        assert_eq!(resolved.source, TenantSource::AllTenantsScope);
    }

    #[test]
    fn test_all_tenants_scope_not_configured() {
        let resolver = TenantResolver::new(MultitenancyConfig {
            grant_access_all_tenants_scope: None,
            ..config()
        });
        let caller = identity(json!({"tenantId": "t1", "scope": ["tenants/all"]}));
        assert!(resolver.resolve(&caller, Some("t2"), SERVER_URL).is_err());
    }

    #[test]
    fn test_missing_tenant() {
        let resolver = TenantResolver::new(config());
        assert_eq!(
            resolver.resolve(&identity(json!({"sub": "x"})), None, SERVER_URL),
            Err(TenantError::MissingTenant)
        );
    }

    #[test]
    fn test_invalid_format() {
        let resolver = TenantResolver::new(config());
        let err = resolver
            .resolve(&identity(json!({"tenantId": "bad tenant!"})), None, SERVER_URL)
            .unwrap_err();
        assert!(matches!(err, TenantError::InvalidFormat(_)));
    }

    #[test]
    fn test_prefixed_claim() {
        let resolver = TenantResolver::new(MultitenancyConfig {
            tenant_id_claim_path: "cognito:groups".to_string(),
            tenant_id_claim_value_prefix: Some("tenantprefix:".to_string()),
            ..config()
        });
        let caller = identity(json!({"cognito:groups": ["practitioner", "tenantprefix:t1", "tenantprefix:t2"]}));

        let resolved = resolver.resolve(&caller, Some("t2"), SERVER_URL).unwrap();
        assert_eq!(resolved.tenant_id, "t2");

        // Array claims need the URL to pick a member
        assert_eq!(
            resolver.resolve(&caller, None, SERVER_URL),
            Err(TenantError::MissingTenant)
        );
        assert!(resolver.resolve(&caller, Some("practitioner"), SERVER_URL).is_err());
    }

    #[test]
    fn test_scalar_claim_requires_prefix_when_configured() {
        let resolver = TenantResolver::new(MultitenancyConfig {
            tenant_id_claim_value_prefix: Some("tenantprefix:".to_string()),
            ..config()
        });
        assert!(resolver
            .resolve(&identity(json!({"tenantId": "t1"})), None, SERVER_URL)
            .is_err());
        let resolved = resolver
            .resolve(&identity(json!({"tenantId": "tenantprefix:t1"})), None, SERVER_URL)
            .unwrap();
        assert_eq!(resolved.tenant_id, "t1");
    }

    #[test]
    fn test_audience_claim() {
        let resolver = TenantResolver::new(config());
        let caller = identity(json!({"aud": "https://fhir.example.com/tenant/t1"}));
        let resolved = resolver.resolve(&caller, Some("t1"), SERVER_URL).unwrap();
        assert_eq!(resolved.tenant_id, "t1");
        assert_eq!(resolved.source, TenantSource::Audience);
    }

    #[test]
    fn test_audience_array_must_agree() {
        let resolver = TenantResolver::new(config());
        let caller = identity(json!({"aud": [
            "https://fhir.example.com/tenant/t1",
            "api://default",
            "https://fhir.example.com/tenant/t1"
        ]}));
        assert_eq!(
            resolver.resolve(&caller, None, SERVER_URL).unwrap().tenant_id,
            "t1"
        );

        let caller = identity(json!({"aud": [
            "https://fhir.example.com/tenant/t1",
            "https://fhir.example.com/tenant/t2"
        ]}));
        assert!(matches!(
            resolver.resolve(&caller, None, SERVER_URL),
            Err(TenantError::AmbiguousAudience(_))
        ));
    }

    #[test]
    fn test_claim_and_audience_must_agree() {
        let resolver = TenantResolver::new(config());
        let agree = identity(json!({
            "tenantId": "t1",
            "aud": "https://fhir.example.com/tenant/t1"
        }));
        let resolved = resolver.resolve(&agree, None, SERVER_URL).unwrap();
        assert_eq!(resolved.all_sources.len(), 2);

        let disagree = identity(json!({
            "tenantId": "t1",
            "aud": "https://fhir.example.com/tenant/t2"
        }));
        assert!(matches!(
            resolver.resolve(&disagree, None, SERVER_URL),
            Err(TenantError::Mismatch(_))
        ));
    }

    #[test]
    fn test_tenant_from_audience() {
        assert_eq!(
            AudienceTenantExtractor::tenant_from_audience(
                "https://fhir.example.com/tenant/abc",
                "https://fhir.example.com/"
            ),
            Some("abc".to_string())
        );
        assert_eq!(
            AudienceTenantExtractor::tenant_from_audience(
                "https://other.example.com/tenant/abc",
                SERVER_URL
            ),
            None
        );
        assert_eq!(
            AudienceTenantExtractor::tenant_from_audience(
                "https://fhir.example.com/tenant/",
                SERVER_URL
            ),
            None
        );
    }
}

//! Tenant validation.
//!
//! Checks applied to the candidates produced by the tenant extractors:
//! agreement between sources, identifier format and agreement with the URL.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::resolver::ResolvedTenant;
use super::source::TenantSource;

/// Pattern every tenant id must match.
pub const TENANT_ID_PATTERN: &str = "^[a-zA-Z0-9_-]{1,64}$";

static TENANT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(TENANT_ID_PATTERN).expect("tenant id pattern is valid"));

/// Error when tenant sources disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantMismatchError {
    /// The tenant ID from the primary source.
    pub primary_tenant: String,
    /// The primary source.
    pub primary_source: TenantSource,
    /// Conflicting tenant ID.
    pub conflicting_tenant: String,
    /// Source of the conflicting tenant.
    pub conflicting_source: TenantSource,
}

impl std::fmt::Display for TenantMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tenant mismatch: {} from {} conflicts with {} from {}",
            self.primary_tenant, self.primary_source, self.conflicting_tenant, self.conflicting_source
        )
    }
}

impl std::error::Error for TenantMismatchError {}

/// Reasons a request could not be bound to a tenant.
///
/// Every variant is reported to the caller as HTTP 401 `Unauthorized`; the
/// detail is only logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// Neither the custom claim nor the audience claim named a tenant.
    #[error("No tenant id found in the access token")]
    MissingTenant,

    /// The custom claim and the audience claim name different tenants.
    #[error(transparent)]
    Mismatch(#[from] TenantMismatchError),

    /// The `aud` claim names more than one tenant.
    #[error("Audience claim names several tenants: {0:?}")]
    AmbiguousAudience(Vec<String>),

    /// The tenant id is not a safe identifier.
    #[error("Tenant id '{0}' is not a valid identifier")]
    InvalidFormat(String),

    /// The URL addresses a tenant other than the caller's.
    #[error("Tenant '{path_tenant}' in the URL does not match tenant '{resolved}' of the caller")]
    PathMismatch {
        /// Tenant from the URL.
        path_tenant: String,
        /// Tenant from the caller's token.
        resolved: String,
    },
}

/// Validates tenant candidates.
pub struct TenantValidator;

impl TenantValidator {
    /// Validates that all sources agree on the tenant ID.
    ///
    /// # Returns
    ///
    /// `Ok(())` if validation passes, or `Err(TenantMismatchError)` if
    /// sources disagree.
    pub fn validate_consistency(resolved: &ResolvedTenant) -> Result<(), TenantMismatchError> {
        // If we only have one source (or none), there's no conflict
        let Some(primary) = resolved.all_sources.first() else {
            return Ok(());
        };

        for (source, tenant_id) in resolved.all_sources.iter().skip(1) {
            if tenant_id != &primary.1 {
                return Err(TenantMismatchError {
                    primary_tenant: primary.1.clone(),
                    primary_source: primary.0,
                    conflicting_tenant: tenant_id.clone(),
                    conflicting_source: *source,
                });
            }
        }

        Ok(())
    }

    /// Validates the identifier format.
    pub fn validate_format(tenant_id: &str) -> Result<(), TenantError> {
        if TENANT_ID_REGEX.is_match(tenant_id) {
            Ok(())
        } else {
            Err(TenantError::InvalidFormat(tenant_id.to_string()))
        }
    }

    /// Validates that the URL tenant, if any, is the resolved tenant.
    pub fn validate_path(tenant_id: &str, path_tenant_id: Option<&str>) -> Result<(), TenantError> {
        match path_tenant_id {
            Some(path_tenant) if path_tenant != tenant_id => Err(TenantError::PathMismatch {
                path_tenant: path_tenant.to_string(),
                resolved: tenant_id.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

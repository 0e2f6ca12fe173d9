//! Tenant source identification.
//!
//! Defines the sources from which a tenant id can be derived.

use std::fmt;

/// Source from which a tenant id was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TenantSource {
    /// The `/tenant/{id}` URL segment, accepted without claim checks
    /// (default tenant).
    UrlPath,
    /// The configured custom token claim.
    Claim,
    /// The `aud` token claim.
    Audience,
    /// The URL segment, accepted because the caller holds the all-tenants
    /// scope.
    AllTenantsScope,
}

impl TenantSource {
    /// Returns true if the tenant came from the caller's token.
    pub fn is_claim_based(&self) -> bool {
        matches!(self, TenantSource::Claim | TenantSource::Audience)
    }

    /// Returns true if claim checks were bypassed.
    pub fn bypassed_claims(&self) -> bool {
        matches!(self, TenantSource::UrlPath | TenantSource::AllTenantsScope)
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSource::UrlPath => write!(f, "url_path"),
            TenantSource::Claim => write!(f, "claim"),
            TenantSource::Audience => write!(f, "audience"),
            TenantSource::AllTenantsScope => write!(f, "all_tenants_scope"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_display() {
        assert_eq!(TenantSource::UrlPath.to_string(), "url_path");
        assert_eq!(TenantSource::Claim.to_string(), "claim");
        assert_eq!(TenantSource::Audience.to_string(), "audience");
        assert_eq!(TenantSource::AllTenantsScope.to_string(), "all_tenants_scope");
    }

    #[test]
    fn test_is_claim_based() {
        assert!(TenantSource::Claim.is_claim_based());
        assert!(TenantSource::Audience.is_claim_based());
        assert!(!TenantSource::UrlPath.is_claim_based());
        assert!(!TenantSource::AllTenantsScope.is_claim_based());
    }

    #[test]
    fn test_bypassed_claims() {
        assert!(TenantSource::UrlPath.bypassed_claims());
        assert!(TenantSource::AllTenantsScope.bypassed_claims());
        assert!(!TenantSource::Claim.bypassed_claims());
    }
}

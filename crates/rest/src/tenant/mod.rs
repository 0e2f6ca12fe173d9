//! Tenant resolution for multi-tenant deployments.
//!
//! Every request of a multi-tenant deployment is bound to exactly one tenant
//! before any resource operation runs. The tenant is derived from the
//! caller's token and cross-checked against the URL:
//!
//! - **Custom claim**: the claim at `tenant_id_claim_path`, optionally
//!   carrying a value prefix (`tenantprefix:t1`). An array claim is only
//!   usable when the URL names one of its members.
//! - **Audience claim**: `aud` values of the form `{server_url}/tenant/{id}`.
//! - **URL path**: `/tenant/{id}/...` when tenant-specific URLs are enabled.
//!
//! # Resolution Order
//!
//! 1. A URL tenant equal to [`DEFAULT_TENANT`], or a caller holding the
//!    configured all-tenants scope, is accepted as is.
//! 2. Candidates are extracted from the custom claim and the audience claim.
//! 3. At least one candidate must exist and all candidates must agree.
//! 4. The tenant must match `^[a-zA-Z0-9_-]{1,64}$` and equal the URL tenant
//!    when one is present.
//!
//! Any failure is a [`TenantError`], answered with HTTP 401.
//!
//! # Example
//!
//! ```rust
//! use helios_interface::UserIdentity;
//! use helios_rest::config::MultitenancyConfig;
//! use helios_rest::tenant::{TenantResolver, TenantSource};
//! use serde_json::json;
//!
//! let config = MultitenancyConfig {
//!     enable_multi_tenancy: true,
//!     tenant_id_claim_path: "tenantId".to_string(),
//!     ..Default::default()
//! };
//! let resolver = TenantResolver::new(config);
//! let identity = UserIdentity::from_value(json!({"tenantId": "t1"}));
//!
//! let resolved = resolver
//!     .resolve(&identity, Some("t1"), "https://fhir.example.com")
//!     .unwrap();
//! assert_eq!(resolved.tenant_id, "t1");
//! assert_eq!(resolved.source, TenantSource::Claim);
//! ```

mod resolver;
mod source;
mod validation;

pub use resolver::{
    AudienceTenantExtractor, ClaimTenantExtractor, ResolvedTenant, TenantResolver,
    TenantSourceExtractor,
};
pub use source::TenantSource;
pub use validation::{TenantError, TenantMismatchError, TenantValidator};

/// Tenant id addressing data shared by every tenant.
pub const DEFAULT_TENANT: &str = "DEFAULT";

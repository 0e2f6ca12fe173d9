//! Single-resource persistence contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FhirResult;

/// CRUD operations on individual resources.
///
/// Every method takes the tenant resolved for the request; `None` means the
/// deployment is single-tenant. Implementations own `id` and `meta`
/// (`versionId`, `lastUpdated`) and return the stored representation.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Returns a short name for logging.
    fn backend_name(&self) -> &'static str;

    /// Stores a new resource. When `id` is `None` the backend assigns one.
    async fn create_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        resource: Value,
        id: Option<&str>,
    ) -> FhirResult<Value>;

    /// Reads the current version of a resource.
    async fn read_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
    ) -> FhirResult<Value>;

    /// Reads a specific version of a resource.
    async fn vread_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        vid: &str,
    ) -> FhirResult<Value>;

    /// Replaces the current version of a resource.
    async fn update_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> FhirResult<Value>;

    /// Merges `patch` into the current version of a resource.
    async fn patch_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        patch: Value,
    ) -> FhirResult<Value>;

    /// Deletes a resource.
    async fn delete_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
    ) -> FhirResult<()>;

    /// Returns the `Subscription` resources whose status is `active`.
    async fn get_active_subscriptions(&self, tenant_id: Option<&str>) -> FhirResult<Vec<Value>>;
}

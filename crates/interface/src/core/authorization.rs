//! Authorization contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{BatchReadWriteRequest, SearchFilter};
use crate::error::FhirResult;
use crate::identity::{RequestContext, UserIdentity};
use crate::operation::{Operation, TypeOperation};

/// Access decisions for the façade.
///
/// Denials are reported as [`FhirError::Unauthorized`](crate::FhirError::Unauthorized);
/// any other error is treated as a failure of the authorization backend itself.
#[async_trait]
pub trait Authorization: Send + Sync {
    /// Verifies the bearer token of a request and returns the caller's claims.
    async fn verify_access_token(
        &self,
        access_token: &str,
        operation: Operation,
        resource_type: Option<&str>,
        id: Option<&str>,
        vid: Option<&str>,
        fhir_service_base_url: &str,
    ) -> FhirResult<UserIdentity>;

    /// Checks an entire bundle in one call.
    async fn is_bundle_request_authorized(
        &self,
        user_identity: &UserIdentity,
        request_context: &RequestContext,
        requests: &[BatchReadWriteRequest],
        fhir_service_base_url: &str,
    ) -> FhirResult<()>;

    /// Returns the read result the caller may see, or a denial.
    async fn authorize_and_filter_read_response(
        &self,
        user_identity: &UserIdentity,
        request_context: &RequestContext,
        operation: TypeOperation,
        read_response: Value,
        fhir_service_base_url: &str,
    ) -> FhirResult<Value>;

    /// Checks that the caller may write `resource_body`.
    async fn is_write_request_authorized(
        &self,
        user_identity: &UserIdentity,
        request_context: &RequestContext,
        operation: TypeOperation,
        resource_body: &Value,
        fhir_service_base_url: &str,
    ) -> FhirResult<()>;

    /// Resource types the caller may search.
    async fn get_allowed_resource_types_for_operation(
        &self,
        user_identity: &UserIdentity,
        request_context: &RequestContext,
        operation: TypeOperation,
    ) -> FhirResult<Vec<String>>;

    /// Filters restricting searches and history to what the caller may see.
    async fn get_search_filter_based_on_identity(
        &self,
        user_identity: &UserIdentity,
        request_context: &RequestContext,
        operation: TypeOperation,
        resource_type: Option<&str>,
        id: Option<&str>,
        fhir_service_base_url: &str,
    ) -> FhirResult<Vec<SearchFilter>>;
}

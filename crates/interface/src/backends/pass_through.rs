//! Authorization that allows every request.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::{Authorization, BatchReadWriteRequest, SearchFilter};
use crate::error::FhirResult;
use crate::identity::{RequestContext, UserIdentity};
use crate::operation::{Operation, TypeOperation};

/// Grants everything; intended for local development and tests.
///
/// The returned identity carries only the scopes configured here, so a
/// deployment using it with multi-tenancy must grant the all-tenants scope
/// or address the default tenant.
#[derive(Debug, Clone, Default)]
pub struct PassThroughAuthorization {
    scopes: Vec<String>,
}

impl PassThroughAuthorization {
    /// Creates an authorization that grants the given scopes.
    pub fn with_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Authorization for PassThroughAuthorization {
    async fn verify_access_token(
        &self,
        _access_token: &str,
        _operation: Operation,
        _resource_type: Option<&str>,
        _id: Option<&str>,
        _vid: Option<&str>,
        _fhir_service_base_url: &str,
    ) -> FhirResult<UserIdentity> {
        Ok(UserIdentity::from_value(json!({ "scope": self.scopes })))
    }

    async fn is_bundle_request_authorized(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _requests: &[BatchReadWriteRequest],
        _fhir_service_base_url: &str,
    ) -> FhirResult<()> {
        Ok(())
    }

    async fn authorize_and_filter_read_response(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _operation: TypeOperation,
        read_response: Value,
        _fhir_service_base_url: &str,
    ) -> FhirResult<Value> {
        Ok(read_response)
    }

    async fn is_write_request_authorized(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _operation: TypeOperation,
        _resource_body: &Value,
        _fhir_service_base_url: &str,
    ) -> FhirResult<()> {
        Ok(())
    }

    async fn get_allowed_resource_types_for_operation(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _operation: TypeOperation,
    ) -> FhirResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn get_search_filter_based_on_identity(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _operation: TypeOperation,
        _resource_type: Option<&str>,
        _id: Option<&str>,
        _fhir_service_base_url: &str,
    ) -> FhirResult<Vec<SearchFilter>> {
        Ok(Vec::new())
    }
}

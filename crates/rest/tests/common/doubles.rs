//! Scripted backends for exercising authorization, search and bundle
//! failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use helios_interface::core::{
    Authorization, BatchReadWriteRequest, BundleErrorKind, BundleService, BundleServiceResponse,
    GlobalSearchRequest, Search, SearchFilter, SearchResponse, TransactionRequest,
    TypeSearchRequest,
};
use helios_interface::{
    FhirError, FhirResult, Operation, RequestContext, TypeOperation, UserIdentity,
};
use serde_json::Value;

/// Authorization keyed by bearer token.
///
/// Each known token maps to the claims of its caller; unknown tokens are
/// rejected. Reads of the listed ids are denied. Clones share what was
/// recorded.
#[derive(Debug, Default, Clone)]
pub struct ScriptedAuthorization {
    tokens: HashMap<String, Value>,
    denied_reads: HashSet<String>,
    deny_bundles: bool,
    deny_writes: bool,
    verified: Arc<Mutex<Vec<(Operation, Option<String>)>>>,
    writes: Arc<Mutex<Vec<(TypeOperation, Value)>>>,
}

impl ScriptedAuthorization {
    /// Creates an authorization knowing no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token`, answering with `claims`.
    pub fn with_token(mut self, token: &str, claims: Value) -> Self {
        self.tokens.insert(token.to_string(), claims);
        self
    }

    /// Denies reads of resources with this id.
    pub fn deny_read(mut self, id: &str) -> Self {
        self.denied_reads.insert(id.to_string());
        self
    }

    /// Denies every bundle.
    pub fn deny_bundles(mut self) -> Self {
        self.deny_bundles = true;
        self
    }

    /// Denies every write check.
    pub fn deny_writes(mut self) -> Self {
        self.deny_writes = true;
        self
    }

    /// Interaction and resource type of every verified token, in order.
    pub fn verified(&self) -> Vec<(Operation, Option<String>)> {
        self.verified.lock().unwrap().clone()
    }

    /// Operation and body of every write check, in order.
    pub fn writes(&self) -> Vec<(TypeOperation, Value)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Authorization for ScriptedAuthorization {
    async fn verify_access_token(
        &self,
        access_token: &str,
        operation: Operation,
        resource_type: Option<&str>,
        _id: Option<&str>,
        _vid: Option<&str>,
        _fhir_service_base_url: &str,
    ) -> FhirResult<UserIdentity> {
        self.verified
            .lock()
            .unwrap()
            .push((operation, resource_type.map(String::from)));
        self.tokens
            .get(access_token)
            .cloned()
            .map(UserIdentity::from_value)
            .ok_or_else(|| FhirError::Unauthorized("Unknown access token".to_string()))
    }

    async fn is_bundle_request_authorized(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        _requests: &[BatchReadWriteRequest],
        _fhir_service_base_url: &str,
    ) -> FhirResult<()> {
        if self.deny_bundles {
            return Err(FhirError::unauthorized());
        }
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
        let id = read_response.get("id").and_then(Value::as_str);
        if id.is_some_and(|id| self.denied_reads.contains(id)) {
            return Err(FhirError::unauthorized());
        }
        Ok(read_response)
    }

    async fn is_write_request_authorized(
        &self,
        _user_identity: &UserIdentity,
        _request_context: &RequestContext,
        operation: TypeOperation,
        resource_body: &Value,
        _fhir_service_base_url: &str,
    ) -> FhirResult<()> {
        self.writes
            .lock()
            .unwrap()
            .push((operation, resource_body.clone()));
        if self.deny_writes {
            return Err(FhirError::unauthorized());
        }
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

/// Bundle service that always fails with the given kind.
#[derive(Debug, Clone)]
pub struct FailingBundleService {
    /// Kind reported on failure.
    pub kind: BundleErrorKind,
    /// Message reported on failure.
    pub message: String,
}

impl FailingBundleService {
    /// A backend failure.
    pub fn system(message: &str) -> Self {
        Self {
            kind: BundleErrorKind::System,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl BundleService for FailingBundleService {
    async fn batch(&self, _request: TransactionRequest) -> FhirResult<BundleServiceResponse> {
        Ok(BundleServiceResponse::failed(self.kind, self.message.clone()))
    }

    async fn transaction(&self, _request: TransactionRequest) -> FhirResult<BundleServiceResponse> {
        Ok(BundleServiceResponse::failed(self.kind, self.message.clone()))
    }
}

/// Search backend answering every search with no matches.
///
/// Clones share the recorded requests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSearch {
    requests: Arc<Mutex<Vec<TypeSearchRequest>>>,
}

impl RecordingSearch {
    /// Every type search received, in order.
    pub fn requests(&self) -> Vec<TypeSearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Search for RecordingSearch {
    async fn type_search(&self, request: TypeSearchRequest) -> FhirResult<SearchResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(SearchResponse {
            success: true,
            ..Default::default()
        })
    }

    async fn global_search(&self, _request: GlobalSearchRequest) -> FhirResult<SearchResponse> {
        Ok(SearchResponse {
            success: true,
            ..Default::default()
        })
    }

    fn validate_subscription_search_criteria(&self, _criteria: &str) -> FhirResult<()> {
        Ok(())
    }
}

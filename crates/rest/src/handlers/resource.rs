//! Per-type resource interactions.
//!
//! A [`ResourceHandler`] binds one resource type to the backends that serve
//! it (generic or special) and runs every interaction through the
//! authorization hooks:
//!
//! | Interaction | Before the backend | After the backend |
//! |-------------|--------------------|-------------------|
//! | read, vread | | read filter |
//! | search-type | allowed types, search filters | read filter on the bundle |
//! | history-type, history-instance | search filters | read filter on the bundle |
//! | create, update | write check, validation | |
//! | patch | write check | |
//! | delete | read, write check on the stored resource | |

use std::sync::Arc;

use helios_interface::core::{
    Authorization, History, InstanceHistoryRequest, Persistence, QueryParams, Search,
    SearchFilter, SearchResponse, TypeHistoryRequest, TypeSearchRequest, Validator,
};
use helios_interface::TypeOperation;
use serde_json::Value;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::extractors::RequestScope;
use crate::profile::{GenericResource, SpecialResource};
use crate::responses::{BundleType, search_bundle, success_outcome};
use crate::validation::validate_resource;

/// Fails when a search or history backend reports `success: false`.
pub(crate) fn ensure_success(response: SearchResponse) -> RestResult<SearchResponse> {
    if response.success {
        Ok(response)
    } else {
        Err(RestError::internal(response.result.message))
    }
}

/// Interactions on one resource type.
#[derive(Clone)]
pub struct ResourceHandler {
    resource_type: String,
    persistence: Arc<dyn Persistence>,
    search: Arc<dyn Search>,
    history: Arc<dyn History>,
    authorization: Arc<dyn Authorization>,
    validators: Vec<Arc<dyn Validator>>,
}

impl std::fmt::Debug for ResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandler")
            .field("resource_type", &self.resource_type)
            .field("backend", &self.persistence.backend_name())
            .finish()
    }
}

impl ResourceHandler {
    /// Creates a handler over explicit backends.
    pub fn new(
        resource_type: impl Into<String>,
        persistence: Arc<dyn Persistence>,
        search: Arc<dyn Search>,
        history: Arc<dyn History>,
        authorization: Arc<dyn Authorization>,
        validators: Vec<Arc<dyn Validator>>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            persistence,
            search,
            history,
            authorization,
            validators,
        }
    }

    /// Creates a handler backed by the generic profile.
    pub fn generic(
        resource_type: &str,
        generic: &GenericResource,
        authorization: Arc<dyn Authorization>,
        validators: Vec<Arc<dyn Validator>>,
    ) -> Self {
        Self::new(
            resource_type,
            generic.persistence.clone(),
            generic.type_search.clone(),
            generic.type_history.clone(),
            authorization,
            validators,
        )
    }

    /// Creates a handler backed by a special resource entry.
    pub fn special(
        resource_type: &str,
        special: &SpecialResource,
        authorization: Arc<dyn Authorization>,
        validators: Vec<Arc<dyn Validator>>,
    ) -> Self {
        Self::new(
            resource_type,
            special.persistence.clone(),
            special.type_search.clone(),
            special.type_history.clone(),
            authorization,
            validators,
        )
    }

    /// The resource type served.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn filter_read(
        &self,
        scope: &RequestScope,
        operation: TypeOperation,
        response: Value,
    ) -> RestResult<Value> {
        Ok(self
            .authorization
            .authorize_and_filter_read_response(
                &scope.identity,
                &scope.context,
                operation,
                response,
                &scope.server_url,
            )
            .await?)
    }

    async fn authorize_write(
        &self,
        scope: &RequestScope,
        operation: TypeOperation,
        body: &Value,
    ) -> RestResult<()> {
        Ok(self
            .authorization
            .is_write_request_authorized(
                &scope.identity,
                &scope.context,
                operation,
                body,
                &scope.server_url,
            )
            .await?)
    }

    async fn search_filters(
        &self,
        scope: &RequestScope,
        operation: TypeOperation,
        id: Option<&str>,
    ) -> RestResult<Vec<SearchFilter>> {
        Ok(self
            .authorization
            .get_search_filter_based_on_identity(
                &scope.identity,
                &scope.context,
                operation,
                Some(&self.resource_type),
                id,
                &scope.server_url,
            )
            .await?)
    }

    fn ensure_body_id(id: &str, body: &Value) -> RestResult<()> {
        let body_id = body.get("id").and_then(Value::as_str);
        if body_id != Some(id) {
            return Err(RestError::bad_request(format!(
                "Can not update resource with ID[{}], while the given request payload has an ID[{}]",
                id,
                body_id.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// `GET [base]/[type]/[id]`
    pub async fn read(&self, scope: &RequestScope, id: &str) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, tenant = ?scope.tenant(), "Processing read request");
        let resource = self
            .persistence
            .read_resource(scope.tenant(), &self.resource_type, id)
            .await?;
        self.filter_read(scope, TypeOperation::Read, resource).await
    }

    /// `GET [base]/[type]/[id]/_history/[vid]`
    pub async fn vread(&self, scope: &RequestScope, id: &str, vid: &str) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, vid = %vid, "Processing vread request");
        let resource = self
            .persistence
            .vread_resource(scope.tenant(), &self.resource_type, id, vid)
            .await?;
        self.filter_read(scope, TypeOperation::VRead, resource).await
    }

    /// `POST [base]/[type]`
    pub async fn create(&self, scope: &RequestScope, body: Value) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, tenant = ?scope.tenant(), "Processing create request");
        self.authorize_write(scope, TypeOperation::Create, &body).await?;
        validate_resource(
            &self.validators,
            &self.resource_type,
            &body,
            &scope.validator_context(TypeOperation::Create),
        )
        .await?;
        Ok(self
            .persistence
            .create_resource(scope.tenant(), &self.resource_type, body, None)
            .await?)
    }

    /// `PUT [base]/[type]/[id]`
    pub async fn update(&self, scope: &RequestScope, id: &str, body: Value) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, "Processing update request");
        Self::ensure_body_id(id, &body)?;
        self.authorize_write(scope, TypeOperation::Update, &body).await?;
        validate_resource(
            &self.validators,
            &self.resource_type,
            &body,
            &scope.validator_context(TypeOperation::Update),
        )
        .await?;
        Ok(self
            .persistence
            .update_resource(scope.tenant(), &self.resource_type, id, body)
            .await?)
    }

    /// `PATCH [base]/[type]/[id]`
    ///
    /// Patches are not validated.
    pub async fn patch(&self, scope: &RequestScope, id: &str, body: Value) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, "Processing patch request");
        Self::ensure_body_id(id, &body)?;
        self.authorize_write(scope, TypeOperation::Patch, &body).await?;
        Ok(self
            .persistence
            .patch_resource(scope.tenant(), &self.resource_type, id, body)
            .await?)
    }

    /// `DELETE [base]/[type]/[id]`
    ///
    /// The write check sees the stored resource.
    pub async fn delete(&self, scope: &RequestScope, id: &str) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, "Processing delete request");
        let existing = self
            .persistence
            .read_resource(scope.tenant(), &self.resource_type, id)
            .await?;
        self.authorize_write(scope, TypeOperation::Delete, &existing).await?;
        self.persistence
            .delete_resource(scope.tenant(), &self.resource_type, id)
            .await?;
        Ok(success_outcome("Successfully deleted resource"))
    }

    /// `GET [base]/[type]?params`
    pub async fn type_search(&self, scope: &RequestScope, params: QueryParams) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, params = params.len(), "Processing search request");
        let allowed_resource_types = self
            .authorization
            .get_allowed_resource_types_for_operation(
                &scope.identity,
                &scope.context,
                TypeOperation::SearchType,
            )
            .await?;
        let search_filters = self
            .search_filters(scope, TypeOperation::SearchType, None)
            .await?;

        let response = ensure_success(
            self.search
                .type_search(TypeSearchRequest {
                    resource_type: self.resource_type.clone(),
                    query_params: params.clone(),
                    base_url: scope.server_url.clone(),
                    allowed_resource_types,
                    search_filters,
                    tenant_id: scope.tenant_id.clone(),
                })
                .await?,
        )?;
        let bundle = search_bundle(
            &scope.server_url,
            &params,
            &response.result,
            BundleType::Searchset,
            Some(&self.resource_type),
            None,
        );
        self.filter_read(scope, TypeOperation::SearchType, bundle).await
    }

    /// `GET [base]/[type]/_history`
    pub async fn type_history(&self, scope: &RequestScope, params: QueryParams) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, "Processing type history request");
        let search_filters = self
            .search_filters(scope, TypeOperation::HistoryType, None)
            .await?;
        let response = ensure_success(
            self.history
                .type_history(TypeHistoryRequest {
                    resource_type: self.resource_type.clone(),
                    query_params: params.clone(),
                    base_url: scope.server_url.clone(),
                    search_filters,
                    tenant_id: scope.tenant_id.clone(),
                })
                .await?,
        )?;
        let bundle = search_bundle(
            &scope.server_url,
            &params,
            &response.result,
            BundleType::History,
            Some(&self.resource_type),
            None,
        );
        self.filter_read(scope, TypeOperation::HistoryType, bundle).await
    }

    /// `GET [base]/[type]/[id]/_history`
    pub async fn instance_history(
        &self,
        scope: &RequestScope,
        id: &str,
        params: QueryParams,
    ) -> RestResult<Value> {
        debug!(resource_type = %self.resource_type, id = %id, "Processing instance history request");
        let search_filters = self
            .search_filters(scope, TypeOperation::HistoryInstance, Some(id))
            .await?;
        let response = ensure_success(
            self.history
                .instance_history(InstanceHistoryRequest {
                    resource_type: self.resource_type.clone(),
                    id: id.to_string(),
                    query_params: params.clone(),
                    base_url: scope.server_url.clone(),
                    search_filters,
                    tenant_id: scope.tenant_id.clone(),
                })
                .await?,
        )?;
        let bundle = search_bundle(
            &scope.server_url,
            &params,
            &response.result,
            BundleType::History,
            Some(&self.resource_type),
            Some(id),
        );
        self.filter_read(scope, TypeOperation::HistoryInstance, bundle)
            .await
    }
}

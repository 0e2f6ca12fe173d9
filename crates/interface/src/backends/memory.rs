//! In-memory backend.
//!
//! Implements [`Persistence`], [`Search`], [`History`] and [`BundleService`]
//! over a tenant-partitioned, versioned map guarded by a single
//! [`tokio::sync::RwLock`]. Deletes are soft: history survives.
//!
//! Transactions are staged on a copy of the store and committed only when
//! every request succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::core::{
    BatchReadWriteRequest, BatchReadWriteResponse, BundleErrorKind, BundleService,
    BundleServiceResponse, ComparisonOperator, GlobalHistoryRequest, GlobalSearchRequest,
    History, InstanceHistoryRequest, LogicalOperator, Persistence, QueryParams, Search,
    SearchEntry, SearchFilter, SearchResponse, SearchResult, TransactionRequest,
    TypeHistoryRequest, TypeSearchRequest,
};
use crate::error::{FhirError, FhirResult};
use crate::operation::TypeOperation;

const DEFAULT_PAGE_SIZE: usize = 20;

/// Storage key: (tenant, resource type, id). Single-tenant data uses an empty tenant.
type StorageKey = (String, String, String);

type Store = HashMap<StorageKey, VersionedResource>;

#[derive(Debug, Clone)]
struct VersionedResource {
    versions: Vec<Value>,
    deleted: bool,
}

impl VersionedResource {
    fn current(&self) -> Option<&Value> {
        if self.deleted {
            None
        } else {
            self.versions.last()
        }
    }
}

fn storage_key(tenant_id: Option<&str>, resource_type: &str, id: &str) -> StorageKey {
    (
        tenant_id.unwrap_or_default().to_string(),
        resource_type.to_string(),
        id.to_string(),
    )
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sets `id` and `meta.versionId`/`meta.lastUpdated` on a resource.
fn stamp(resource: &mut Value, resource_type: &str, id: &str, version: usize) {
    if !resource.is_object() {
        *resource = json!({ "resourceType": resource_type });
    }
    if let Value::Object(map) = resource {
        map.insert("id".to_string(), Value::String(id.to_string()));
        let meta = map
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            *meta = Value::Object(Map::new());
        }
        if let Value::Object(meta) = meta {
            meta.insert("versionId".to_string(), Value::String(version.to_string()));
            meta.insert("lastUpdated".to_string(), Value::String(now()));
        }
    }
}

fn meta_field(resource: &Value, field: &str) -> String {
    resource
        .get("meta")
        .and_then(|m| m.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn create_in(
    store: &mut Store,
    tenant_id: Option<&str>,
    resource_type: &str,
    mut resource: Value,
    id: Option<&str>,
) -> FhirResult<Value> {
    let id = id
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let key = storage_key(tenant_id, resource_type, &id);
    match store.get_mut(&key) {
        Some(existing) if !existing.deleted => Err(FhirError::BadRequest(format!(
            "Resource {}/{} already exists",
            resource_type, id
        ))),
        Some(existing) => {
            stamp(&mut resource, resource_type, &id, existing.versions.len() + 1);
            existing.versions.push(resource.clone());
            existing.deleted = false;
            Ok(resource)
        }
        None => {
            stamp(&mut resource, resource_type, &id, 1);
            store.insert(
                key,
                VersionedResource {
                    versions: vec![resource.clone()],
                    deleted: false,
                },
            );
            Ok(resource)
        }
    }
}

fn read_in(
    store: &Store,
    tenant_id: Option<&str>,
    resource_type: &str,
    id: &str,
) -> FhirResult<Value> {
    store
        .get(&storage_key(tenant_id, resource_type, id))
        .and_then(VersionedResource::current)
        .cloned()
        .ok_or_else(|| FhirError::not_found(resource_type, id))
}

fn update_in(
    store: &mut Store,
    tenant_id: Option<&str>,
    resource_type: &str,
    id: &str,
    mut resource: Value,
) -> FhirResult<Value> {
    let entry = store
        .get_mut(&storage_key(tenant_id, resource_type, id))
        .filter(|e| !e.deleted)
        .ok_or_else(|| FhirError::not_found(resource_type, id))?;
    stamp(&mut resource, resource_type, id, entry.versions.len() + 1);
    entry.versions.push(resource.clone());
    Ok(resource)
}

fn patch_in(
    store: &mut Store,
    tenant_id: Option<&str>,
    resource_type: &str,
    id: &str,
    patch: &Value,
) -> FhirResult<Value> {
    let mut merged = read_in(store, tenant_id, resource_type, id)?;
    json_patch::merge(&mut merged, patch);
    update_in(store, tenant_id, resource_type, id, merged)
}

fn delete_in(
    store: &mut Store,
    tenant_id: Option<&str>,
    resource_type: &str,
    id: &str,
) -> FhirResult<Value> {
    let entry = store
        .get_mut(&storage_key(tenant_id, resource_type, id))
        .filter(|e| !e.deleted)
        .ok_or_else(|| FhirError::not_found(resource_type, id))?;
    entry.deleted = true;
    entry
        .versions
        .last()
        .cloned()
        .ok_or_else(|| FhirError::not_found(resource_type, id))
}

/// Resolves a dot path inside a resource.
fn value_at<'a>(resource: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(resource, |current, segment| current.get(segment))
}

fn scalar_strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(scalar_strings).collect(),
        Value::Object(map) => map
            .get("reference")
            .map(scalar_strings)
            .unwrap_or_default(),
        Value::Null => Vec::new(),
    }
}

fn matches_params(resource: &Value, params: &QueryParams) -> bool {
    params.iter().all(|(key, expected)| {
        if key == "_id" {
            return resource.get("id").and_then(Value::as_str) == Some(expected.as_str());
        }
        if key.starts_with('_') {
            return true;
        }
        value_at(resource, key)
            .map(|v| scalar_strings(v).iter().any(|s| s == expected))
            .unwrap_or(false)
    })
}

fn matches_filter(resource: &Value, filter: &SearchFilter) -> bool {
    let found = value_at(resource, &filter.key)
        .map(scalar_strings)
        .unwrap_or_default();
    let hit = found.iter().any(|s| filter.value.contains(s));
    match filter.comparison_operator {
        ComparisonOperator::Equal => hit,
        ComparisonOperator::NotEqual => !hit,
    }
}

fn matches_filters(resource: &Value, filters: &[SearchFilter]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let (and_filters, or_filters): (Vec<_>, Vec<_>) = filters
        .iter()
        .partition(|f| f.logical_operator == LogicalOperator::And);
    and_filters.iter().all(|f| matches_filter(resource, f))
        && (or_filters.is_empty() || or_filters.iter().any(|f| matches_filter(resource, f)))
}

fn page_params(params: &QueryParams) -> (usize, usize) {
    let lookup = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.parse::<usize>().ok())
    };
    (
        lookup("_count").unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        lookup("_getpagesoffset").unwrap_or(0),
    )
}

fn page_url(base: &str, params: &QueryParams, offset: usize) -> String {
    let mut query: Vec<String> = params
        .iter()
        .filter(|(k, _)| k != "_getpagesoffset")
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    query.push(format!("_getpagesoffset={}", offset));
    format!("{}?{}", base, query.join("&"))
}

/// Slices matches into a page and computes navigation links.
fn paginate(
    entries: Vec<SearchEntry>,
    params: &QueryParams,
    link_base: &str,
) -> SearchResponse {
    let total = entries.len();
    let (count, offset) = page_params(params);
    let page: Vec<SearchEntry> = entries.into_iter().skip(offset).take(count).collect();
    let last_offset = if total == 0 { 0 } else { (total - 1) / count * count };

    SearchResponse {
        success: true,
        result: SearchResult {
            num_results: total,
            message: String::new(),
            entries: page,
            first_result_url: (offset > 0).then(|| page_url(link_base, params, 0)),
            previous_result_url: (offset > 0)
                .then(|| page_url(link_base, params, offset.saturating_sub(count))),
            next_result_url: (offset + count < total)
                .then(|| page_url(link_base, params, offset + count)),
            last_result_url: (offset + count < total)
                .then(|| page_url(link_base, params, last_offset)),
        },
    }
}

/// In-process implementation of the data contracts.
///
/// Cloning shares the underlying store.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<RwLock<Store>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not deleted) resources across all tenants.
    pub async fn len(&self) -> usize {
        self.store
            .read()
            .await
            .values()
            .filter(|r| !r.deleted)
            .count()
    }

    /// Returns true when no live resources are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn search_current(
        &self,
        tenant_id: Option<&str>,
        resource_types: &[String],
        params: &QueryParams,
        filters: &[SearchFilter],
        base_url: &str,
    ) -> Vec<SearchEntry> {
        let tenant = tenant_id.unwrap_or_default();
        let store = self.store.read().await;
        let mut entries: Vec<SearchEntry> = store
            .iter()
            .filter(|((t, rt, _), _)| {
                t == tenant && (resource_types.is_empty() || resource_types.contains(rt))
            })
            .filter_map(|((_, rt, id), r)| r.current().map(|res| (rt, id, res)))
            .filter(|(_, _, res)| matches_params(res, params) && matches_filters(res, filters))
            .map(|(rt, id, res)| SearchEntry {
                full_url: format!("{}/{}/{}", base_url, rt, id),
                resource: res.clone(),
                search_mode: "match".to_string(),
            })
            .collect();
        entries.sort_by(|a, b| a.full_url.cmp(&b.full_url));
        entries
    }

    async fn history_of(
        &self,
        tenant_id: Option<&str>,
        resource_type: Option<&str>,
        id: Option<&str>,
        filters: &[SearchFilter],
        base_url: &str,
    ) -> Vec<SearchEntry> {
        let tenant = tenant_id.unwrap_or_default();
        let store = self.store.read().await;
        let mut entries: Vec<(String, SearchEntry)> = store
            .iter()
            .filter(|((t, rt, rid), _)| {
                t == tenant
                    && resource_type.is_none_or(|want| want == rt)
                    && id.is_none_or(|want| want == rid)
            })
            .flat_map(|((_, rt, rid), r)| {
                r.versions.iter().map(move |version| (rt, rid, version))
            })
            .filter(|(_, _, version)| matches_filters(version, filters))
            .map(|(rt, rid, version)| {
                let vid = meta_field(version, "versionId");
                (
                    meta_field(version, "lastUpdated"),
                    SearchEntry {
                        full_url: format!("{}/{}/{}/_history/{}", base_url, rt, rid, vid),
                        resource: version.clone(),
                        search_mode: "match".to_string(),
                    },
                )
            })
            .collect();
        // newest first
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, e)| e).collect()
    }

    /// Applies one normalized request to `store`.
    fn apply(
        store: &mut Store,
        tenant_id: Option<&str>,
        request: &BatchReadWriteRequest,
    ) -> FhirResult<BatchReadWriteResponse> {
        let resource_type = request.resource_type.as_str();
        let id = request.id.as_str();
        let body = || {
            request.resource.clone().ok_or_else(|| {
                FhirError::BadRequest(format!(
                    "{} of {}/{} requires a resource",
                    request.operation, resource_type, id
                ))
            })
        };

        let (stored, returned) = match request.operation {
            TypeOperation::Create => {
                let stored = create_in(store, tenant_id, resource_type, body()?, Some(id))?;
                (stored, json!({}))
            }
            TypeOperation::Update => {
                let stored = update_in(store, tenant_id, resource_type, id, body()?)?;
                (stored, json!({}))
            }
            TypeOperation::Patch => {
                let stored = patch_in(store, tenant_id, resource_type, id, &body()?)?;
                (stored, json!({}))
            }
            TypeOperation::Delete => {
                let stored = delete_in(store, tenant_id, resource_type, id)?;
                (stored, json!({}))
            }
            TypeOperation::Read => {
                let stored = read_in(store, tenant_id, resource_type, id)?;
                let returned = stored.clone();
                (stored, returned)
            }
            other => {
                return Err(FhirError::BadRequest(format!(
                    "Operation {} is not supported in bundles",
                    other
                )));
            }
        };

        Ok(BatchReadWriteResponse {
            id: id.to_string(),
            vid: meta_field(&stored, "versionId"),
            operation: request.operation,
            last_modified: meta_field(&stored, "lastUpdated"),
            resource_type: resource_type.to_string(),
            resource: returned,
        })
    }

    /// Rewrites intra-bundle references (`urn:uuid:...`) to `{type}/{id}`.
    fn resolve_references(requests: &[BatchReadWriteRequest]) -> Vec<BatchReadWriteRequest> {
        let targets: HashMap<&str, String> = requests
            .iter()
            .filter_map(|r| {
                r.full_url
                    .as_deref()
                    .map(|url| (url, format!("{}/{}", r.resource_type, r.id)))
            })
            .collect();

        requests
            .iter()
            .cloned()
            .map(|mut request| {
                let references = std::mem::take(&mut request.references);
                if let Some(resource) = request.resource.as_mut() {
                    for reference in &references {
                        if let (Some(target), Some(slot)) = (
                            targets.get(reference.reference.as_str()),
                            resource.pointer_mut(&reference.pointer),
                        ) {
                            *slot = Value::String(target.clone());
                        }
                    }
                }
                request.references = references;
                request
            })
            .collect()
    }
}

#[async_trait]
impl Persistence for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        resource: Value,
        id: Option<&str>,
    ) -> FhirResult<Value> {
        let mut store = self.store.write().await;
        create_in(&mut store, tenant_id, resource_type, resource, id)
    }

    async fn read_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
    ) -> FhirResult<Value> {
        let store = self.store.read().await;
        read_in(&store, tenant_id, resource_type, id)
    }

    async fn vread_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        vid: &str,
    ) -> FhirResult<Value> {
        let store = self.store.read().await;
        let entry = store
            .get(&storage_key(tenant_id, resource_type, id))
            .ok_or_else(|| FhirError::not_found(resource_type, id))?;
        entry
            .versions
            .iter()
            .find(|v| meta_field(v, "versionId") == vid)
            .cloned()
            .ok_or_else(|| FhirError::ResourceVersionNotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                version: vid.to_string(),
            })
    }

    async fn update_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> FhirResult<Value> {
        let mut store = self.store.write().await;
        update_in(&mut store, tenant_id, resource_type, id, resource)
    }

    async fn patch_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
        patch: Value,
    ) -> FhirResult<Value> {
        let mut store = self.store.write().await;
        patch_in(&mut store, tenant_id, resource_type, id, &patch)
    }

    async fn delete_resource(
        &self,
        tenant_id: Option<&str>,
        resource_type: &str,
        id: &str,
    ) -> FhirResult<()> {
        let mut store = self.store.write().await;
        delete_in(&mut store, tenant_id, resource_type, id).map(|_| ())
    }

    async fn get_active_subscriptions(&self, tenant_id: Option<&str>) -> FhirResult<Vec<Value>> {
        let tenant = tenant_id.unwrap_or_default();
        let store = self.store.read().await;
        Ok(store
            .iter()
            .filter(|((t, rt, _), _)| t == tenant && rt == "Subscription")
            .filter_map(|(_, r)| r.current())
            .filter(|res| res.get("status").and_then(Value::as_str) == Some("active"))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Search for MemoryBackend {
    async fn type_search(&self, request: TypeSearchRequest) -> FhirResult<SearchResponse> {
        let entries = self
            .search_current(
                request.tenant_id.as_deref(),
                std::slice::from_ref(&request.resource_type),
                &request.query_params,
                &request.search_filters,
                &request.base_url,
            )
            .await;
        let link_base = format!("{}/{}", request.base_url, request.resource_type);
        Ok(paginate(entries, &request.query_params, &link_base))
    }

    async fn global_search(&self, request: GlobalSearchRequest) -> FhirResult<SearchResponse> {
        let entries = self
            .search_current(
                request.tenant_id.as_deref(),
                &request.allowed_resource_types,
                &request.query_params,
                &request.search_filters,
                &request.base_url,
            )
            .await;
        Ok(paginate(entries, &request.query_params, &request.base_url))
    }

    fn validate_subscription_search_criteria(&self, criteria: &str) -> FhirResult<()> {
        let invalid = |detail: String| {
            FhirError::BadRequest(format!(
                "Search criteria '{}' is not valid for a Subscription: {}",
                criteria, detail
            ))
        };
        let (resource_type, query) = criteria.split_once('?').unwrap_or((criteria, ""));
        let well_formed = resource_type
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase())
            && resource_type.chars().all(|c| c.is_ascii_alphanumeric());
        if !well_formed {
            return Err(invalid(format!("'{}' is not a resource type", resource_type)));
        }

        for key in query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| pair.split_once('=').map_or(pair, |(key, _)| key))
        {
            // only `_id` among the result parameters filters matches
            if key.starts_with('_') && key != "_id" {
                return Err(invalid(format!("parameter {} is not supported", key)));
            }
            if key.contains(':') {
                return Err(invalid(format!("modifier in {} is not supported", key)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl History for MemoryBackend {
    async fn instance_history(
        &self,
        request: InstanceHistoryRequest,
    ) -> FhirResult<SearchResponse> {
        let entries = self
            .history_of(
                request.tenant_id.as_deref(),
                Some(&request.resource_type),
                Some(&request.id),
                &request.search_filters,
                &request.base_url,
            )
            .await;
        if entries.is_empty() {
            return Err(FhirError::not_found(&request.resource_type, &request.id));
        }
        let link_base = format!(
            "{}/{}/{}/_history",
            request.base_url, request.resource_type, request.id
        );
        Ok(paginate(entries, &request.query_params, &link_base))
    }

    async fn type_history(&self, request: TypeHistoryRequest) -> FhirResult<SearchResponse> {
        let entries = self
            .history_of(
                request.tenant_id.as_deref(),
                Some(&request.resource_type),
                None,
                &request.search_filters,
                &request.base_url,
            )
            .await;
        let link_base = format!("{}/{}/_history", request.base_url, request.resource_type);
        Ok(paginate(entries, &request.query_params, &link_base))
    }

    async fn global_history(&self, request: GlobalHistoryRequest) -> FhirResult<SearchResponse> {
        let entries = self
            .history_of(
                request.tenant_id.as_deref(),
                None,
                None,
                &request.search_filters,
                &request.base_url,
            )
            .await;
        let link_base = format!("{}/_history", request.base_url);
        Ok(paginate(entries, &request.query_params, &link_base))
    }
}

#[async_trait]
impl BundleService for MemoryBackend {
    async fn batch(&self, request: TransactionRequest) -> FhirResult<BundleServiceResponse> {
        let tenant_id = request.tenant_id.as_deref();
        let requests = Self::resolve_references(&request.requests);
        let mut store = self.store.write().await;
        let mut responses = Vec::with_capacity(requests.len());
        for (index, entry) in requests.iter().enumerate() {
            match Self::apply(&mut store, tenant_id, entry) {
                Ok(response) => responses.push(response),
                Err(e) => {
                    return Ok(BundleServiceResponse::failed(
                        BundleErrorKind::User,
                        format!("Failed to process entry {}: {}", index, e),
                    ));
                }
            }
        }
        Ok(BundleServiceResponse::succeeded(responses))
    }

    async fn transaction(&self, request: TransactionRequest) -> FhirResult<BundleServiceResponse> {
        let tenant_id = request.tenant_id.as_deref();
        let requests = Self::resolve_references(&request.requests);

        let mut store = self.store.write().await;
        let mut staged = store.clone();
        let mut responses = Vec::with_capacity(requests.len());
        for (index, entry) in requests.iter().enumerate() {
            match Self::apply(&mut staged, tenant_id, entry) {
                Ok(response) => responses.push(response),
                Err(e) => {
                    debug!(index, error = %e, "Rolling back in-memory transaction");
                    return Ok(BundleServiceResponse::failed(
                        BundleErrorKind::User,
                        format!("Failed to process entry {}: {}", index, e),
                    ));
                }
            }
        }
        *store = staged;

        debug!(
            entries = responses.len(),
            started = %request.start_time,
            "Committed in-memory transaction"
        );
        Ok(BundleServiceResponse::succeeded(responses))
    }
}

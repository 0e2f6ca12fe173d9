//! Search and history contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FhirResult;

/// Query parameters in request order.
pub type QueryParams = Vec<(String, String)>;

/// How a [`SearchFilter`] compares its key against its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// The field equals one of the values.
    #[default]
    #[serde(rename = "==")]
    Equal,
    /// The field equals none of the values.
    #[serde(rename = "!=")]
    NotEqual,
}

/// How multiple [`SearchFilter`]s combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    /// Every filter must match.
    #[default]
    And,
    /// At least one filter must match.
    Or,
}

/// A restriction injected by the authorization backend into searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilter {
    /// Dot path of the field to compare.
    pub key: String,
    /// Accepted (or rejected) values.
    pub value: Vec<String>,
    /// Comparison applied between the field and `value`.
    pub comparison_operator: ComparisonOperator,
    /// How this filter combines with its siblings.
    pub logical_operator: LogicalOperator,
}

/// `GET [base]/[type]?params`
#[derive(Debug, Clone, Default)]
pub struct TypeSearchRequest {
    pub resource_type: String,
    pub query_params: QueryParams,
    pub base_url: String,
    pub allowed_resource_types: Vec<String>,
    pub search_filters: Vec<SearchFilter>,
    pub tenant_id: Option<String>,
}

/// `GET [base]?params`
#[derive(Debug, Clone, Default)]
pub struct GlobalSearchRequest {
    pub query_params: QueryParams,
    pub base_url: String,
    pub allowed_resource_types: Vec<String>,
    pub search_filters: Vec<SearchFilter>,
    pub tenant_id: Option<String>,
}

/// `GET [base]/[type]/[id]/_history`
#[derive(Debug, Clone, Default)]
pub struct InstanceHistoryRequest {
    pub resource_type: String,
    pub id: String,
    pub query_params: QueryParams,
    pub base_url: String,
    pub search_filters: Vec<SearchFilter>,
    pub tenant_id: Option<String>,
}

/// `GET [base]/[type]/_history`
#[derive(Debug, Clone, Default)]
pub struct TypeHistoryRequest {
    pub resource_type: String,
    pub query_params: QueryParams,
    pub base_url: String,
    pub search_filters: Vec<SearchFilter>,
    pub tenant_id: Option<String>,
}

/// `GET [base]/_history`
#[derive(Debug, Clone, Default)]
pub struct GlobalHistoryRequest {
    pub query_params: QueryParams,
    pub base_url: String,
    pub search_filters: Vec<SearchFilter>,
    pub tenant_id: Option<String>,
}

/// One matched resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub full_url: String,
    pub resource: Value,
    /// `match`, `include` or `outcome`.
    pub search_mode: String,
}

/// A page of search or history results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub num_results: usize,
    pub message: String,
    pub entries: Vec<SearchEntry>,
    pub first_result_url: Option<String>,
    pub previous_result_url: Option<String>,
    pub next_result_url: Option<String>,
    pub last_result_url: Option<String>,
}

/// Search or history outcome.
///
/// `success == false` carries the failure reason in `result.message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub result: SearchResult,
}

/// Search backend.
#[async_trait]
pub trait Search: Send + Sync {
    /// Searches one resource type.
    async fn type_search(&self, request: TypeSearchRequest) -> FhirResult<SearchResponse>;

    /// Searches across resource types.
    async fn global_search(&self, request: GlobalSearchRequest) -> FhirResult<SearchResponse>;

    /// Checks that `criteria` (`[type]?[params]`) is a search this backend
    /// can evaluate for a Subscription.
    fn validate_subscription_search_criteria(&self, criteria: &str) -> FhirResult<()>;
}

/// History backend.
#[async_trait]
pub trait History: Send + Sync {
    /// Versions of one resource.
    async fn instance_history(&self, request: InstanceHistoryRequest)
    -> FhirResult<SearchResponse>;

    /// Versions of every resource of one type.
    async fn type_history(&self, request: TypeHistoryRequest) -> FhirResult<SearchResponse>;

    /// Versions of every resource.
    async fn global_history(&self, request: GlobalHistoryRequest) -> FhirResult<SearchResponse>;
}

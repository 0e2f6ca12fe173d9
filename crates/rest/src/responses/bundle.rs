//! Bundle response building.
//!
//! Provides utilities for building FHIR Bundle responses: `searchset` and
//! `history` pages rendered from backend [`SearchResult`]s, and the
//! `transaction-response` envelope.

use chrono::{SecondsFormat, Utc};
use helios_interface::core::{QueryParams, SearchResult};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

/// Bundle types produced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleType {
    /// Transaction response bundle.
    TransactionResponse,
    /// Search results bundle.
    Searchset,
    /// History results bundle.
    History,
}

impl BundleType {
    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleType::TransactionResponse => "transaction-response",
            BundleType::Searchset => "searchset",
            BundleType::History => "history",
        }
    }
}

/// A link in a Bundle.
#[derive(Debug, Clone)]
pub struct BundleLink {
    /// The relation type (self, next, previous, first, last).
    pub relation: String,
    /// The URL.
    pub url: String,
}

impl BundleLink {
    /// Creates a new link.
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }

    /// Creates a self link.
    pub fn self_link(url: impl Into<String>) -> Self {
        Self::new("self", url)
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "relation": self.relation,
            "url": self.url
        })
    }
}

/// Response information in a bundle entry.
#[derive(Debug, Clone)]
pub struct BundleEntryResponse {
    /// HTTP status line (`201 Created`).
    pub status: String,
    /// Location header.
    pub location: Option<String>,
    /// ETag header.
    pub etag: Option<String>,
    /// Last-Modified header.
    pub last_modified: Option<String>,
}

/// An entry in a Bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleEntry {
    /// Full URL of the resource.
    pub full_url: Option<String>,
    /// The resource itself.
    pub resource: Option<Value>,
    /// Search mode (for searchset and history bundles).
    pub search_mode: Option<String>,
    /// Response information (for transaction responses).
    pub response: Option<BundleEntryResponse>,
}

impl BundleEntry {
    /// Creates a search result entry.
    pub fn search_result(
        resource: Value,
        full_url: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            full_url: Some(full_url.into()),
            resource: Some(resource),
            search_mode: Some(mode.into()),
            response: None,
        }
    }

    /// Creates a transaction response entry.
    pub fn response(response: BundleEntryResponse, resource: Option<Value>) -> Self {
        Self {
            full_url: None,
            resource,
            search_mode: None,
            response: Some(response),
        }
    }

    /// Converts to FHIR JSON.
    pub fn to_json(&self) -> Value {
        let mut entry = serde_json::json!({});

        if let Some(url) = &self.full_url {
            entry["fullUrl"] = serde_json::json!(url);
        }

        if let Some(resource) = &self.resource {
            entry["resource"] = resource.clone();
        }

        if let Some(mode) = &self.search_mode {
            entry["search"] = serde_json::json!({
                "mode": mode
            });
        }

        if let Some(response) = &self.response {
            let mut resp = serde_json::json!({
                "status": response.status
            });
            if let Some(location) = &response.location {
                resp["location"] = serde_json::json!(location);
            }
            if let Some(etag) = &response.etag {
                resp["etag"] = serde_json::json!(etag);
            }
            if let Some(last_modified) = &response.last_modified {
                resp["lastModified"] = serde_json::json!(last_modified);
            }
            entry["response"] = resp;
        }

        entry
    }
}

/// Builder for Bundle resources.
#[derive(Debug)]
pub struct BundleBuilder {
    bundle_type: BundleType,
    id: String,
    last_updated: Option<String>,
    total: Option<usize>,
    links: Vec<BundleLink>,
    entries: Vec<BundleEntry>,
}

impl BundleBuilder {
    /// Creates a new builder for a specific bundle type with a fresh id.
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            bundle_type,
            id: Uuid::new_v4().to_string(),
            last_updated: None,
            total: None,
            links: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Creates a searchset bundle builder.
    pub fn searchset() -> Self {
        Self::new(BundleType::Searchset)
    }

    /// Creates a history bundle builder.
    pub fn history() -> Self {
        Self::new(BundleType::History)
    }

    /// Creates a transaction response bundle builder.
    pub fn transaction_response() -> Self {
        Self::new(BundleType::TransactionResponse)
    }

    /// Sets the total count.
    pub fn total(mut self, count: usize) -> Self {
        self.total = Some(count);
        self
    }

    /// Stamps `meta.lastUpdated` with the current time.
    pub fn last_updated_now(mut self) -> Self {
        self.last_updated = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        self
    }

    /// Adds a link.
    pub fn add_link(mut self, link: BundleLink) -> Self {
        self.links.push(link);
        self
    }

    /// Adds a self link.
    pub fn self_link(self, url: impl Into<String>) -> Self {
        self.add_link(BundleLink::self_link(url))
    }

    /// Adds a link when `url` is present.
    pub fn optional_link(self, relation: &str, url: Option<&String>) -> Self {
        match url {
            Some(url) => self.add_link(BundleLink::new(relation, url.clone())),
            None => self,
        }
    }

    /// Adds an entry.
    pub fn add_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Builds the Bundle resource.
    ///
    /// `link` and `entry` are always present, possibly empty.
    pub fn build(self) -> Value {
        let mut bundle = serde_json::json!({
            "resourceType": "Bundle",
            "id": self.id,
            "type": self.bundle_type.as_str()
        });

        if let Some(last_updated) = self.last_updated {
            bundle["meta"] = serde_json::json!({ "lastUpdated": last_updated });
        }

        if let Some(total) = self.total {
            bundle["total"] = serde_json::json!(total);
        }

        bundle["link"] =
            serde_json::json!(self.links.iter().map(|l| l.to_json()).collect::<Vec<_>>());
        bundle["entry"] =
            serde_json::json!(self.entries.iter().map(|e| e.to_json()).collect::<Vec<_>>());

        bundle
    }
}

/// URL of the page a search or history request addressed.
///
/// `{server_url}[/{type}[/{id}]][/_history]?{params}`.
pub fn self_link_url(
    server_url: &str,
    query_params: &QueryParams,
    bundle_type: BundleType,
    resource_type: Option<&str>,
    id: Option<&str>,
) -> String {
    let mut path = server_url.trim_end_matches('/').to_string();
    for segment in [resource_type, id].into_iter().flatten() {
        path.push('/');
        path.push_str(segment);
    }
    if bundle_type == BundleType::History {
        path.push_str("/_history");
    }

    match Url::parse(&path) {
        Ok(mut url) => {
            if !query_params.is_empty() {
                url.query_pairs_mut().extend_pairs(query_params.iter());
            }
            url.to_string()
        }
        Err(_) => path,
    }
}

/// Renders a search or history page.
pub fn search_bundle(
    server_url: &str,
    query_params: &QueryParams,
    result: &SearchResult,
    bundle_type: BundleType,
    resource_type: Option<&str>,
    id: Option<&str>,
) -> Value {
    let self_url = self_link_url(server_url, query_params, bundle_type, resource_type, id);

    let builder = BundleBuilder::new(bundle_type)
        .last_updated_now()
        .total(result.num_results)
        .self_link(self_url)
        .optional_link("previous", result.previous_result_url.as_ref())
        .optional_link("next", result.next_result_url.as_ref())
        .optional_link("first", result.first_result_url.as_ref())
        .optional_link("last", result.last_result_url.as_ref());

    result
        .entries
        .iter()
        .fold(builder, |builder, entry| {
            builder.add_entry(BundleEntry::search_result(
                entry.resource.clone(),
                entry.full_url.clone(),
                entry.search_mode.clone(),
            ))
        })
        .build()
}

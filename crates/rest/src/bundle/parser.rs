//! Transaction bundle parsing.
//!
//! Parsing runs in three passes so that each failure is reported at the
//! right stage of transaction processing:
//!
//! 1. [`parse_structure`] checks the payload against the typed request
//!    bundle model.
//! 2. [`classify_entries`] maps every entry to the interaction it requests,
//!    without rejecting anything the server may not support. Its output
//!    feeds the capability check.
//! 3. [`normalize`] turns classified entries into the ordered
//!    [`BatchReadWriteRequest`] list sent to the bundle service, rejecting
//!    entries that cannot be part of a transaction.

use std::collections::{BTreeMap, BTreeSet};

use helios_interface::TypeOperation;
use helios_interface::core::{BatchReadWriteRequest, BundleReference};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{RestError, RestResult};

/// Message for bundles of any type other than `transaction`.
pub const ONLY_TRANSACTION_SUPPORTED: &str =
    "Currently this server only support transaction Bundles";

/// Bundle types a client may submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestBundleType {
    /// Atomic unit of work.
    Transaction,
    /// Independent operations.
    Batch,
    /// Any other bundle type; never accepted at the root.
    Document,
    /// See [`RequestBundleType::Document`].
    Message,
    /// See [`RequestBundleType::Document`].
    TransactionResponse,
    /// See [`RequestBundleType::Document`].
    BatchResponse,
    /// See [`RequestBundleType::Document`].
    History,
    /// See [`RequestBundleType::Document`].
    Searchset,
    /// See [`RequestBundleType::Document`].
    Collection,
}

/// HTTP verb of a bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

/// `Bundle.entry.request`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntryRequest {
    /// Entry verb.
    pub method: EntryMethod,
    /// Relative or absolute target URL.
    pub url: String,
    /// Conditional read header; conditional entries are rejected.
    #[serde(default)]
    pub if_none_match: Option<String>,
    /// Conditional read header.
    #[serde(default)]
    pub if_modified_since: Option<String>,
    /// Version-aware update header.
    #[serde(default)]
    pub if_match: Option<String>,
    /// Conditional create query.
    #[serde(default)]
    pub if_none_exist: Option<String>,
    /// Logical id, ignored.
    #[serde(default)]
    pub id: Option<String>,
    /// Element extensions, ignored.
    #[serde(default)]
    pub extension: Option<Value>,
}

/// `Bundle.entry`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEntry {
    /// Client correlation token (`urn:uuid:...`).
    #[serde(default)]
    pub full_url: Option<String>,
    /// Entry payload.
    #[serde(default)]
    pub resource: Option<Value>,
    /// Requested interaction.
    pub request: EntryRequest,
}

/// A request bundle as submitted to `POST [base]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestBundle {
    /// Always `Bundle`.
    pub resource_type: String,
    /// Logical id, ignored.
    #[serde(default)]
    pub id: Option<String>,
    /// Bundle metadata, ignored.
    #[serde(default)]
    pub meta: Option<Value>,
    /// Ignored.
    #[serde(default)]
    pub implicit_rules: Option<String>,
    /// Ignored.
    #[serde(default)]
    pub language: Option<String>,
    /// Business identifier, ignored.
    #[serde(default)]
    pub identifier: Option<Value>,
    /// Bundle type.
    #[serde(rename = "type")]
    pub bundle_type: RequestBundleType,
    /// Assembly time, ignored.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Only meaningful for search results.
    #[serde(default)]
    pub total: Option<u64>,
    /// Ignored.
    #[serde(default)]
    pub link: Option<Value>,
    /// Entries, in submission order.
    #[serde(default)]
    pub entry: Vec<RequestEntry>,
    /// Ignored.
    #[serde(default)]
    pub signature: Option<Value>,
}

/// An entry mapped to the interaction it requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedEntry {
    /// Requested interaction.
    pub operation: TypeOperation,
    /// Target type, from the URL or, for creates, the resource.
    pub resource_type: String,
    /// Target id, when the URL names one.
    pub id: Option<String>,
    /// Target version, for version reads.
    pub vid: Option<String>,
    /// The URL carried search parameters (`Patient?name=x`).
    pub conditional: bool,
    /// `Bundle.entry.fullUrl`.
    pub full_url: Option<String>,
    /// `Bundle.entry.resource`.
    pub resource: Option<Value>,
}

/// Checks `payload` against the request bundle model.
pub fn parse_structure(payload: &Value) -> RestResult<RequestBundle> {
    let bundle = RequestBundle::deserialize(payload).map_err(|e| RestError::InvalidResource {
        message: e.to_string(),
    })?;
    if bundle.resource_type != "Bundle" {
        return Err(RestError::InvalidResource {
            message: format!("not a valid 'Bundle': resourceType is '{}'", bundle.resource_type),
        });
    }
    Ok(bundle)
}

/// Makes an entry URL relative to the server.
///
/// Absolute URLs must start with `server_url`.
pub fn relative_url<'a>(url: &'a str, server_url: &str) -> RestResult<&'a str> {
    let server_url = server_url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix(server_url) {
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
            return Ok(rest.trim_start_matches('/'));
        }
    }
    if url.contains("://") {
        return Err(RestError::bad_request(format!(
            "Bundle entry url {} does not belong to this server",
            url
        )));
    }
    Ok(url.trim_start_matches('/'))
}

fn unparseable(url: &str) -> RestError {
    RestError::bad_request(format!("Unable to parse the Bundle entry url '{}'", url))
}

/// Maps one entry to the interaction it requests.
pub fn classify_entry(entry: &RequestEntry, server_url: &str) -> RestResult<ClassifiedEntry> {
    let url = relative_url(&entry.request.url, server_url)?;
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let has_query = query.is_some();

    let (operation, resource_type, id, vid) = match (entry.request.method, segments.as_slice()) {
        (EntryMethod::Get, []) => (TypeOperation::SearchSystem, None, None, None),
        (EntryMethod::Get, ["_history"]) => (TypeOperation::HistorySystem, None, None, None),
        (EntryMethod::Get, [t]) | (EntryMethod::Get, [t, "_search"]) => {
            (TypeOperation::SearchType, Some(*t), None, None)
        }
        (EntryMethod::Get, [t, "_history"]) => (TypeOperation::HistoryType, Some(*t), None, None),
        (EntryMethod::Get, [t, id]) => (TypeOperation::Read, Some(*t), Some(*id), None),
        (EntryMethod::Get, [t, id, "_history"]) => {
            (TypeOperation::HistoryInstance, Some(*t), Some(*id), None)
        }
        (EntryMethod::Get, [t, id, "_history", vid]) => {
            (TypeOperation::VRead, Some(*t), Some(*id), Some(*vid))
        }
        (EntryMethod::Post, [t, "_search"]) => (TypeOperation::SearchType, Some(*t), None, None),
        (EntryMethod::Post, [t]) => (TypeOperation::Create, Some(*t), None, None),
        (EntryMethod::Put, [t]) if has_query => (TypeOperation::Update, Some(*t), None, None),
        (EntryMethod::Put, [t, id]) => (TypeOperation::Update, Some(*t), Some(*id), None),
        (EntryMethod::Patch, [t]) if has_query => (TypeOperation::Patch, Some(*t), None, None),
        (EntryMethod::Patch, [t, id]) => (TypeOperation::Patch, Some(*t), Some(*id), None),
        (EntryMethod::Delete, [t]) if has_query => {
            (TypeOperation::Delete, Some(*t), None, None)
        }
        (EntryMethod::Delete, [t, id]) => (TypeOperation::Delete, Some(*t), Some(*id), None),
        _ => return Err(unparseable(&entry.request.url)),
    };

    // System-level reads have no type; they are reported under the empty type
    // so that the capability check rejects them.
    let resource_type = match (operation, resource_type) {
        (TypeOperation::Create, Some(url_type)) => entry
            .resource
            .as_ref()
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
            .unwrap_or(url_type)
            .to_string(),
        (_, Some(t)) => t.to_string(),
        (_, None) => String::new(),
    };

    Ok(ClassifiedEntry {
        operation,
        resource_type,
        conditional: has_query && id.is_none() && operation.is_write(),
        id: id.map(String::from),
        vid: vid.map(String::from),
        full_url: entry.full_url.clone(),
        resource: entry.resource.clone(),
    })
}

/// Classifies every entry, preserving order.
pub fn classify_entries(
    bundle: &RequestBundle,
    server_url: &str,
) -> RestResult<Vec<ClassifiedEntry>> {
    bundle
        .entry
        .iter()
        .map(|entry| classify_entry(entry, server_url))
        .collect()
}

/// Interactions requested per resource type.
pub fn requested_operations(entries: &[ClassifiedEntry]) -> BTreeMap<String, Vec<TypeOperation>> {
    let mut requested: BTreeMap<String, BTreeSet<TypeOperation>> = BTreeMap::new();
    for entry in entries {
        requested
            .entry(entry.resource_type.clone())
            .or_default()
            .insert(entry.operation);
    }
    requested
        .into_iter()
        .map(|(resource_type, ops)| (resource_type, ops.into_iter().collect()))
        .collect()
}

fn unsupported_entry(kind: &str) -> RestError {
    RestError::bad_request(format!(
        "We currently do not support {} entries in the Bundle",
        kind
    ))
}

/// Builds the ordered request list sent to the bundle service.
pub fn normalize(entries: Vec<ClassifiedEntry>) -> RestResult<Vec<BatchReadWriteRequest>> {
    let full_urls: BTreeSet<String> = entries
        .iter()
        .filter_map(|entry| entry.full_url.clone())
        .collect();

    entries
        .into_iter()
        .map(|entry| normalize_entry(entry, &full_urls))
        .collect()
}

fn normalize_entry(
    entry: ClassifiedEntry,
    full_urls: &BTreeSet<String>,
) -> RestResult<BatchReadWriteRequest> {
    match entry.operation {
        TypeOperation::SearchType | TypeOperation::SearchSystem => {
            return Err(unsupported_entry("SEARCH"));
        }
        TypeOperation::VRead => return Err(unsupported_entry("V_READ")),
        TypeOperation::HistoryType
        | TypeOperation::HistoryInstance
        | TypeOperation::HistorySystem => return Err(unsupported_entry("HISTORY")),
        _ if entry.conditional => return Err(unsupported_entry("conditional")),
        _ => {}
    }

    let id = match (entry.operation, entry.id) {
        (_, Some(id)) => id,
        (TypeOperation::Create, None) => entry
            .resource
            .as_ref()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        (_, None) => {
            return Err(RestError::bad_request(format!(
                "Bundle entry for {} {} requires an id",
                entry.operation, entry.resource_type
            )));
        }
    };

    let resource = match entry.operation {
        TypeOperation::Create | TypeOperation::Update | TypeOperation::Patch => {
            Some(entry.resource.ok_or_else(|| {
                RestError::bad_request(format!(
                    "Bundle entry for {} {}/{} requires a resource",
                    entry.operation, entry.resource_type, id
                ))
            })?)
        }
        _ => None,
    };

    let references = resource
        .as_ref()
        .map(|r| collect_references(r, full_urls))
        .unwrap_or_default();

    Ok(BatchReadWriteRequest {
        operation: entry.operation,
        resource_type: entry.resource_type,
        id,
        vid: entry.vid,
        resource,
        full_url: entry.full_url,
        references,
    })
}

fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Finds `reference` values inside `resource` that target another entry's
/// `fullUrl`, with the JSON pointer of each.
pub fn collect_references(resource: &Value, full_urls: &BTreeSet<String>) -> Vec<BundleReference> {
    let mut found = Vec::new();
    walk_references(resource, String::new(), full_urls, &mut found);
    found
}

fn walk_references(
    value: &Value,
    pointer: String,
    full_urls: &BTreeSet<String>,
    found: &mut Vec<BundleReference>,
) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_pointer = format!("{}/{}", pointer, escape_pointer_token(key));
                if key == "reference" {
                    if let Some(reference) = child.as_str().filter(|r| full_urls.contains(*r)) {
                        found.push(BundleReference {
                            reference: reference.to_string(),
                            pointer: child_pointer,
                        });
                        continue;
                    }
                }
                walk_references(child, child_pointer, full_urls, found);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                walk_references(item, format!("{}/{}", pointer, index), full_urls, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SERVER: &str = "https://fhir.example.com";

    fn entry(method: &str, url: &str, resource: Option<Value>) -> RequestEntry {
        serde_json::from_value(json!({
            "resource": resource,
            "request": { "method": method, "url": url }
        }))
        .unwrap()
    }

    fn classify(method: &str, url: &str) -> ClassifiedEntry {
        classify_entry(&entry(method, url, None), SERVER).unwrap()
    }

    #[test]
    fn test_parse_structure_accepts_transaction() {
        let bundle = parse_structure(&json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [{
                "fullUrl": "urn:uuid:1",
                "resource": { "resourceType": "Patient" },
                "request": { "method": "POST", "url": "Patient" }
            }]
        }))
        .unwrap();
        assert_eq!(bundle.bundle_type, RequestBundleType::Transaction);
        assert_eq!(bundle.entry.len(), 1);
    }

    #[test]
    fn test_parse_structure_rejects_unknown_field() {
        let err = parse_structure(&json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "invalidField": "foo"
        }))
        .unwrap_err();
        assert!(matches!(err, RestError::InvalidResource { .. }));
        assert!(err.to_string().contains("invalidField"));
    }

    #[test]
    fn test_parse_structure_rejects_bad_method_and_missing_request() {
        let err = parse_structure(&json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [{ "request": { "method": "FETCH", "url": "Patient" } }]
        }))
        .unwrap_err();
        assert!(matches!(err, RestError::InvalidResource { .. }));

        let err = parse_structure(&json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": [{ "resource": { "resourceType": "Patient" } }]
        }))
        .unwrap_err();
        assert!(matches!(err, RestError::InvalidResource { .. }));
    }

    #[test]
    fn test_parse_structure_rejects_non_bundle() {
        let err = parse_structure(&json!({ "resourceType": "Patient", "type": "transaction" }))
            .unwrap_err();
        assert!(matches!(err, RestError::InvalidResource { .. }));
    }

    #[test]
    fn test_classify_get_variants() {
        assert_eq!(classify("GET", "Patient/1").operation, TypeOperation::Read);
        assert_eq!(classify("GET", "Patient").operation, TypeOperation::SearchType);
        assert_eq!(
            classify("GET", "Patient?name=smith").operation,
            TypeOperation::SearchType
        );
        assert_eq!(
            classify("GET", "Patient/_history").operation,
            TypeOperation::HistoryType
        );
        assert_eq!(
            classify("GET", "Patient/1/_history").operation,
            TypeOperation::HistoryInstance
        );

        let vread = classify("GET", "Patient/1/_history/2");
        assert_eq!(vread.operation, TypeOperation::VRead);
        assert_eq!(vread.id.as_deref(), Some("1"));
        assert_eq!(vread.vid.as_deref(), Some("2"));
    }

    #[test]
    fn test_classify_write_variants() {
        assert_eq!(classify("POST", "Patient").operation, TypeOperation::Create);
        assert_eq!(classify("PUT", "Patient/1").operation, TypeOperation::Update);
        assert_eq!(classify("PATCH", "Patient/1").operation, TypeOperation::Patch);
        assert_eq!(classify("DELETE", "Patient/1").operation, TypeOperation::Delete);
        assert!(classify("DELETE", "Patient?name=x").conditional);
    }

    #[test]
    fn test_classify_absolute_url() {
        let entry = classify("GET", "https://fhir.example.com/Patient/1");
        assert_eq!(entry.operation, TypeOperation::Read);
        assert_eq!(entry.resource_type, "Patient");

        let err = classify_entry(&entry_of("GET", "https://other.example.com/Patient/1"), SERVER)
            .unwrap_err();
        assert!(matches!(err, RestError::BadRequest { .. }));
    }

    fn entry_of(method: &str, url: &str) -> RequestEntry {
        entry(method, url, None)
    }

    #[test]
    fn test_classify_create_uses_resource_type() {
        let classified = classify_entry(
            &entry("POST", "Patient", Some(json!({ "resourceType": "Observation" }))),
            SERVER,
        )
        .unwrap();
        assert_eq!(classified.resource_type, "Observation");
    }

    #[test]
    fn test_classify_unparseable_url() {
        let err = classify_entry(&entry_of("PUT", "Patient/1/extra/segments"), SERVER).unwrap_err();
        assert!(err.to_string().contains("Patient/1/extra/segments"));
    }

    #[test]
    fn test_requested_operations_groups_by_type() {
        let entries = vec![
            classify("POST", "Patient"),
            classify("GET", "Patient/1"),
            classify("GET", "Patient/2"),
            classify("DELETE", "Observation/1"),
        ];
        let requested = requested_operations(&entries);
        assert_eq!(
            requested["Patient"],
            vec![TypeOperation::Create, TypeOperation::Read]
        );
        assert_eq!(requested["Observation"], vec![TypeOperation::Delete]);
    }

    #[test]
    fn test_normalize_rejects_search_and_vread() {
        let err = normalize(vec![classify("GET", "Patient?name=x")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: We currently do not support SEARCH entries in the Bundle"
        );

        let err = normalize(vec![classify("GET", "Patient/1/_history/1")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: We currently do not support V_READ entries in the Bundle"
        );
    }

    #[test]
    fn test_normalize_generates_create_id_and_keeps_full_url() {
        let mut create = classify_entry(
            &entry("POST", "Patient", Some(json!({ "resourceType": "Patient" }))),
            SERVER,
        )
        .unwrap();
        create.full_url = Some("urn:uuid:abc".to_string());

        let requests = normalize(vec![create]).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operation, TypeOperation::Create);
        assert!(Uuid::parse_str(&requests[0].id).is_ok());
        assert_eq!(requests[0].full_url.as_deref(), Some("urn:uuid:abc"));
    }

    #[test]
    fn test_normalize_keeps_order_and_ids() {
        let requests = normalize(vec![
            classify("GET", "Patient/1"),
            classify("DELETE", "Observation/9"),
        ])
        .unwrap();
        assert_eq!(requests[0].id, "1");
        assert!(requests[0].resource.is_none());
        assert_eq!(requests[1].resource_type, "Observation");
        assert_eq!(requests[1].id, "9");
    }

    #[test]
    fn test_normalize_requires_resource_for_update() {
        let err = normalize(vec![classify("PUT", "Patient/1")]).unwrap_err();
        assert!(matches!(err, RestError::BadRequest { .. }));
    }

    #[test]
    fn test_collect_references() {
        let full_urls: BTreeSet<String> = ["urn:uuid:patient".to_string()].into_iter().collect();
        let observation = json!({
            "resourceType": "Observation",
            "subject": { "reference": "urn:uuid:patient" },
            "performer": [
                { "reference": "Practitioner/1" },
                { "reference": "urn:uuid:patient" }
            ]
        });

        let references = collect_references(&observation, &full_urls);
        let mut pointers: Vec<&str> = references.iter().map(|r| r.pointer.as_str()).collect();
        pointers.sort();
        assert_eq!(pointers, vec!["/performer/1/reference", "/subject/reference"]);
        assert!(references.iter().all(|r| r.reference == "urn:uuid:patient"));
    }
}

//! Test fixtures for REST API testing.
//!
//! Provides predefined FHIR resources and bundles for use in tests.

use serde_json::{Value, json};

/// A patient with a gender, searchable by the in-memory backend.
pub fn patient(id: &str, gender: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "gender": gender,
        "name": [{ "family": "Smith", "given": ["John"] }]
    })
}

/// A rest-hook Subscription targeting `endpoint`.
pub fn subscription(endpoint: &str) -> Value {
    json!({
        "resourceType": "Subscription",
        "status": "requested",
        "reason": "Monitor new neonatal function",
        "criteria": "Observation?code=1975-2",
        "channel": {
            "type": "rest-hook",
            "endpoint": endpoint,
            "payload": "application/fhir+json"
        }
    })
}

/// A bundle of `bundle_type` with the given entries.
pub fn bundle(bundle_type: &str, entries: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": bundle_type,
        "entry": entries
    })
}

/// A transaction bundle with the given entries.
pub fn transaction(entries: Vec<Value>) -> Value {
    bundle("transaction", entries)
}

/// `POST {resource_type}` entry for `resource`, addressed as `full_url`.
pub fn post_entry(full_url: &str, resource: Value) -> Value {
    let resource_type = resource["resourceType"].as_str().unwrap_or_default().to_string();
    json!({
        "fullUrl": full_url,
        "resource": resource,
        "request": { "method": "POST", "url": resource_type }
    })
}

/// `PUT {url}` entry for `resource`.
pub fn put_entry(url: &str, resource: Value) -> Value {
    json!({
        "resource": resource,
        "request": { "method": "PUT", "url": url }
    })
}

/// `GET {url}` entry.
pub fn get_entry(url: &str) -> Value {
    json!({ "request": { "method": "GET", "url": url } })
}

/// `DELETE {url}` entry.
pub fn delete_entry(url: &str) -> Value {
    json!({ "request": { "method": "DELETE", "url": url } })
}

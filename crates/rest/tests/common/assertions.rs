//! HTTP response assertions.
//!
//! Provides assertion utilities for testing HTTP responses.

use axum_test::TestResponse;
use serde_json::Value;

/// Asserts that the response has the expected status code.
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status_code().as_u16();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}: {}",
        expected,
        actual,
        response.text()
    );
}

/// Asserts that the response has an ETag header.
pub fn assert_has_etag(response: &TestResponse) {
    assert!(
        response.headers().contains_key("etag"),
        "Expected ETag header"
    );
}

/// Asserts that the response body is a FHIR resource of the expected type.
pub fn assert_resource_type(body: &Value, expected: &str) {
    let actual = body
        .get("resourceType")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    assert_eq!(
        actual, expected,
        "Expected resourceType {}, got {}",
        expected, actual
    );
}

/// Returns the diagnostics text of the first issue of an OperationOutcome.
pub fn outcome_text(body: &Value) -> String {
    assert_resource_type(body, "OperationOutcome");
    body["issue"][0]["details"]["text"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// Asserts that the response is an OperationOutcome whose text contains `expected`.
pub fn assert_outcome_contains(response: &TestResponse, expected: &str) {
    let body: Value = response.json();
    let text = outcome_text(&body);
    assert!(
        text.contains(expected),
        "Expected OperationOutcome containing {:?}, got {:?}",
        expected,
        text
    );
}

/// Returns the `response.status` of every entry of a transaction-response.
pub fn entry_statuses(bundle: &Value) -> Vec<String> {
    bundle["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|e| e["response"]["status"].as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

//! Transaction-response rendering.

use helios_interface::TypeOperation;
use helios_interface::core::BatchReadWriteResponse;
use serde_json::Value;

use crate::responses::bundle::{BundleBuilder, BundleEntry, BundleEntryResponse};

/// Status line of one outcome.
///
/// A read-class outcome whose resource was withheld by authorization
/// carries an empty object.
fn entry_status(outcome: &BatchReadWriteResponse) -> &'static str {
    match outcome.operation {
        TypeOperation::Create => "201 Created",
        op if op.is_read_class() && outcome.resource.as_object().is_some_and(|o| o.is_empty()) => {
            "403 Forbidden"
        }
        _ => "200 OK",
    }
}

/// Renders the `transaction-response` bundle for `outcomes`, in order.
pub fn transaction_response(server_url: &str, outcomes: &[BatchReadWriteResponse]) -> Value {
    outcomes
        .iter()
        .fold(
            BundleBuilder::transaction_response().self_link(server_url),
            |builder, outcome| {
                let response = BundleEntryResponse {
                    status: entry_status(outcome).to_string(),
                    location: Some(format!("{}/{}", outcome.resource_type, outcome.id)),
                    etag: Some(outcome.vid.clone()),
                    last_modified: Some(outcome.last_modified.clone()),
                };
                let resource = outcome
                    .operation
                    .is_read_class()
                    .then(|| outcome.resource.clone());
                builder.add_entry(BundleEntry::response(response, resource))
            },
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outcome(operation: TypeOperation, resource: Value) -> BatchReadWriteResponse {
        BatchReadWriteResponse {
            id: "8cafa46d".to_string(),
            vid: "1".to_string(),
            operation,
            last_modified: "2020-04-10T20:41:39.912Z".to_string(),
            resource_type: "Patient".to_string(),
            resource,
        }
    }

    #[test]
    fn test_render_statuses_and_resources() {
        let patient = json!({ "resourceType": "Patient", "id": "8cafa46d" });
        let bundle = transaction_response(
            "https://fhir.example.com",
            &[
                outcome(TypeOperation::Create, json!({})),
                outcome(TypeOperation::Read, patient.clone()),
                outcome(TypeOperation::Read, json!({})),
                outcome(TypeOperation::Delete, json!({})),
            ],
        );

        assert_eq!(bundle["type"], "transaction-response");
        assert_eq!(bundle["link"][0]["relation"], "self");
        assert_eq!(bundle["link"][0]["url"], "https://fhir.example.com");

        let entries = bundle["entry"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["response"]["status"], "201 Created");
        assert_eq!(entries[0]["response"]["location"], "Patient/8cafa46d");
        assert_eq!(entries[0]["response"]["etag"], "1");
        assert_eq!(
            entries[0]["response"]["lastModified"],
            "2020-04-10T20:41:39.912Z"
        );
        assert!(entries[0].get("resource").is_none());

        assert_eq!(entries[1]["response"]["status"], "200 OK");
        assert_eq!(entries[1]["resource"], patient);

        assert_eq!(entries[2]["response"]["status"], "403 Forbidden");
        assert_eq!(entries[2]["resource"], json!({}));

        assert_eq!(entries[3]["response"]["status"], "200 OK");
        assert!(entries[3].get("resource").is_none());
    }

    #[test]
    fn test_render_empty() {
        let bundle = transaction_response("https://fhir.example.com", &[]);
        assert!(bundle["entry"].as_array().unwrap().is_empty());
        assert!(bundle["id"].as_str().is_some());
    }
}

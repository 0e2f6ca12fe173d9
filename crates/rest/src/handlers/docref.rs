//! US Core fetch DocumentReference operation.
//!
//! Implements [`$docref`](http://hl7.org/fhir/us/core/OperationDefinition/docref):
//! - `GET [base]/DocumentReference/$docref?patient=...`
//! - `POST [base]/DocumentReference/$docref` with a `Parameters` body
//!
//! The operation is a DocumentReference search in disguise: its parameters
//! are rewritten into search parameters and run through the regular
//! `search-type` path, authorization included.

use axum::{
    Json,
    extract::{RawQuery, State},
    response::{IntoResponse, Response},
};
use helios_interface::TypeOperation;
use helios_interface::core::QueryParams;
use serde_json::Value;
use tracing::debug;

use super::query_params;
use crate::error::{RestError, RestResult};
use crate::extractors::{FhirResource, RequestScope};
use crate::state::AppState;

/// Resource type searched by `$docref`.
pub const DOCUMENT_REFERENCE: &str = "DocumentReference";

/// Document type searched when the request names none (a CCD).
pub const DEFAULT_DOCUMENT_TYPE: &str = "http://loinc.org|34133-9";

/// Parameters of a `$docref` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocRefParams {
    /// Patient id or reference.
    pub patient: String,
    /// Start of the period of interest.
    pub start: Option<String>,
    /// End of the period of interest.
    pub end: Option<String>,
    /// Document type as `system|code`.
    pub document_type: Option<String>,
}

#[derive(Default)]
struct Collected {
    patient: Option<String>,
    start: Option<String>,
    end: Option<String>,
    document_type: Option<String>,
}

impl Collected {
    fn set(&mut self, name: &str, value: String) -> RestResult<()> {
        let slot = match name {
            "patient" => &mut self.patient,
            "start" => &mut self.start,
            "end" => &mut self.end,
            "type" => &mut self.document_type,
            other => {
                return Err(RestError::bad_request(format!(
                    "Unknown $docref parameter '{}'",
                    other
                )));
            }
        };
        if slot.is_some() {
            return Err(RestError::bad_request(format!(
                "$docref parameter '{}' may appear only once",
                name
            )));
        }
        *slot = Some(value);
        Ok(())
    }

    fn finish(self) -> RestResult<DocRefParams> {
        let patient = self
            .patient
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RestError::bad_request("$docref requires the 'patient' parameter"))?;
        if let Some(document_type) = &self.document_type {
            if !document_type.contains('|') {
                return Err(RestError::bad_request(format!(
                    "$docref parameter 'type' must be 'system|code', got '{}'",
                    document_type
                )));
            }
        }
        Ok(DocRefParams {
            patient,
            start: self.start,
            end: self.end,
            document_type: self.document_type,
        })
    }
}

impl DocRefParams {
    /// Reads the parameters of a `GET` request.
    pub fn from_query(params: &QueryParams) -> RestResult<Self> {
        let mut collected = Collected::default();
        for (name, value) in params {
            collected.set(name, value.clone())?;
        }
        collected.finish()
    }

    /// Reads the parameters of a `POST` request from a `Parameters` resource.
    pub fn from_parameters(body: &Value) -> RestResult<Self> {
        if body.get("resourceType").and_then(Value::as_str) != Some("Parameters") {
            return Err(RestError::bad_request(
                "$docref expects a Parameters resource",
            ));
        }
        let mut collected = Collected::default();
        let parameters = body
            .get("parameter")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for parameter in parameters {
            let name = parameter
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let value = parameter_value(parameter).ok_or_else(|| {
                RestError::bad_request(format!("$docref parameter '{}' has no value", name))
            })?;
            collected.set(name, value)?;
        }
        collected.finish()
    }

    /// The equivalent DocumentReference search.
    ///
    /// Without a period only the most recent document is asked for.
    pub fn search_params(&self) -> QueryParams {
        let mut params = vec![("patient".to_string(), self.patient.clone())];
        if self.start.is_none() && self.end.is_none() {
            params.push(("_sort".to_string(), "-period".to_string()));
            params.push(("_count".to_string(), "1".to_string()));
        }
        if let Some(start) = &self.start {
            params.push(("period".to_string(), format!("ge{}", start)));
        }
        if let Some(end) = &self.end {
            params.push(("period".to_string(), format!("le{}", end)));
        }
        params.push((
            "type".to_string(),
            self.document_type
                .clone()
                .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()),
        ));
        params
    }
}

fn parameter_value(parameter: &Value) -> Option<String> {
    if let Some(coding) = parameter.get("valueCoding") {
        let system = coding.get("system").and_then(Value::as_str).unwrap_or_default();
        let code = coding.get("code").and_then(Value::as_str)?;
        return Some(format!("{}|{}", system, code));
    }
    ["valueId", "valueString", "valueDate", "valueDateTime", "valueUri"]
        .iter()
        .find_map(|key| parameter.get(*key).and_then(Value::as_str))
        .or_else(|| parameter.pointer("/valueReference/reference").and_then(Value::as_str))
        .map(String::from)
}

async fn docref(state: &AppState, scope: &RequestScope, params: DocRefParams) -> RestResult<Response> {
    debug!(patient = %params.patient, tenant = ?scope.tenant(), "Processing $docref request");
    let handler = state.resource_handler(DOCUMENT_REFERENCE, TypeOperation::SearchType)?;
    let bundle = handler.type_search(scope, params.search_params()).await?;
    Ok(Json(bundle).into_response())
}

/// Handler for `GET [base]/DocumentReference/$docref`.
pub async fn docref_get_handler(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
    scope: RequestScope,
) -> RestResult<Response> {
    let params = DocRefParams::from_query(&query_params(raw.as_deref()))?;
    docref(&state, &scope, params).await
}

/// Handler for `POST [base]/DocumentReference/$docref`.
pub async fn docref_post_handler(
    State(state): State<AppState>,
    scope: RequestScope,
    FhirResource(body): FhirResource,
) -> RestResult<Response> {
    let params = DocRefParams::from_parameters(&body)?;
    docref(&state, &scope, params).await
}

//! OperationOutcome bodies.
//!
//! Every failure the façade reports, and the confirmation of a delete, is a
//! single-issue OperationOutcome:
//!
//! ```json
//! {"resourceType":"OperationOutcome","issue":[{"severity":"error","code":"not-found","details":{"text":"..."}}]}
//! ```

use serde::Serialize;
use serde_json::{Value, json};

/// `OperationOutcome.issue.severity` values the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The request failed.
    Error,
    /// The request succeeded.
    Information,
}

/// `OperationOutcome.issue.code` values the server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    /// Malformed request or resource.
    Invalid,
    /// Unknown resource or version.
    NotFound,
    /// Type or interaction not offered.
    NotSupported,
    /// Token missing, invalid, or no tenant.
    Login,
    /// Authorization denied.
    Forbidden,
    /// Backend failure.
    Exception,
    /// Success message.
    Informational,
}

#[derive(Debug, Serialize)]
struct IssueDetails<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Issue<'a> {
    severity: IssueSeverity,
    code: IssueType,
    details: IssueDetails<'a>,
}

fn outcome(severity: IssueSeverity, code: IssueType, text: &str) -> Value {
    json!({
        "resourceType": "OperationOutcome",
        "issue": [Issue {
            severity,
            code,
            details: IssueDetails { text },
        }]
    })
}

/// Error OperationOutcome carrying `message`.
pub fn error_outcome(code: IssueType, message: &str) -> Value {
    outcome(IssueSeverity::Error, code, message)
}

/// Informational OperationOutcome carrying `message`.
pub fn success_outcome(message: &str) -> Value {
    outcome(IssueSeverity::Information, IssueType::Informational, message)
}

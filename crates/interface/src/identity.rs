//! Caller identity and request context passed to authorization backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims decoded from the caller's access token.
///
/// The identity is an opaque JSON object produced by
/// [`Authorization::verify_access_token`](crate::core::Authorization::verify_access_token).
/// Claim lookups use dot-separated paths so nested claims can be configured
/// (`"ext.tenant"`); a key containing a colon such as `"cognito:groups"` is a
/// single segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity {
    claims: Map<String, Value>,
}

impl UserIdentity {
    /// Claim holding the tenant resolved for the current request.
    pub const TENANT_ID_CLAIM: &'static str = "tenantId";

    /// Creates an identity from a claims object.
    pub fn new(claims: Map<String, Value>) -> Self {
        Self { claims }
    }

    /// Creates an identity from a JSON value; non-objects yield an empty identity.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(claims) => Self { claims },
            _ => Self::default(),
        }
    }

    /// Resolves a claim by dot-separated path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.claims.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = self.claims.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns the granted scopes.
    ///
    /// The `scope` claim may be a JSON array or a space-separated string.
    pub fn scopes(&self) -> Vec<String> {
        match self.claims.get("scope") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            Some(Value::String(s)) => s.split_whitespace().map(String::from).collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if the given scope was granted.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| s == scope)
    }

    /// Returns the tenant attached after tenant resolution.
    pub fn tenant_id(&self) -> Option<&str> {
        self.claims
            .get(Self::TENANT_ID_CLAIM)
            .and_then(Value::as_str)
    }

    /// Attaches the resolved tenant to the identity.
    pub fn set_tenant_id(&mut self, tenant_id: &str) {
        self.claims.insert(
            Self::TENANT_ID_CLAIM.to_string(),
            Value::String(tenant_id.to_string()),
        );
    }

    /// Returns the raw claims.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Snapshot of the inbound HTTP request given to authorization checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// HTTP method.
    pub verb: String,
    /// Request path and query.
    pub url: String,
    /// Value of the `Host` header, if any.
    pub host_name: Option<String>,
    /// Request headers (lower-cased names); credentials are not copied.
    pub headers: BTreeMap<String, String>,
}

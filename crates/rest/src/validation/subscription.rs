//! Subscription validation.
//!
//! Subscriptions make the server call out to client endpoints, so they are
//! only accepted when:
//!
//! - the channel is a `rest-hook` with an endpoint on the allow list,
//! - the search backend accepts the `criteria`,
//! - the tenant would not exceed [`MAX_ACTIVE_SUBSCRIPTIONS`] active
//!   subscriptions once the request is applied.
//!
//! Under multi-tenancy each tenant has its own allow list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use helios_interface::core::{Persistence, Search, Validator, ValidatorContext};
use helios_interface::{FhirError, FhirResult, TypeOperation};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Active subscriptions allowed per tenant.
pub const MAX_ACTIVE_SUBSCRIPTIONS: usize = 300;

const SUBSCRIPTION: &str = "Subscription";
const BUNDLE: &str = "Bundle";
const REST_HOOK: &str = "rest-hook";

/// How an allow-list entry matches a channel endpoint.
#[derive(Debug, Clone)]
pub enum EndpointPattern {
    /// The endpoint must be equal to this string.
    Exact(String),
    /// The endpoint must match this expression.
    Pattern(Regex),
}

impl EndpointPattern {
    /// Returns true if `endpoint` is allowed by this pattern.
    pub fn matches(&self, endpoint: &str) -> bool {
        match self {
            EndpointPattern::Exact(allowed) => allowed == endpoint,
            EndpointPattern::Pattern(regex) => regex.is_match(endpoint),
        }
    }
}

/// One allow-list entry.
#[derive(Debug, Clone)]
pub struct SubscriptionEndpoint {
    /// Allowed endpoint.
    pub endpoint: EndpointPattern,
    /// Headers the endpoint expects (`name: value`).
    pub headers: Vec<String>,
    /// Tenant the entry belongs to, under multi-tenancy.
    pub tenant_id: Option<String>,
}

impl SubscriptionEndpoint {
    /// Allows exactly `endpoint`.
    pub fn exact(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: EndpointPattern::Exact(endpoint.into()),
            headers: Vec::new(),
            tenant_id: None,
        }
    }

    /// Allows endpoints matching `pattern`.
    pub fn pattern(pattern: Regex) -> Self {
        Self {
            endpoint: EndpointPattern::Pattern(pattern),
            headers: Vec::new(),
            tenant_id: None,
        }
    }

    /// Parses a configured entry: `^...` is a regular expression, anything
    /// else an exact URL.
    pub fn parse(entry: &str) -> Result<Self, regex::Error> {
        if entry.starts_with('^') {
            Ok(Self::pattern(Regex::new(entry)?))
        } else {
            Ok(Self::exact(entry))
        }
    }

    /// Binds the entry to a tenant.
    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Sets the expected headers.
    pub fn with_headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }
}

#[derive(Debug)]
enum AllowList {
    Single(Vec<EndpointPattern>),
    PerTenant(HashMap<String, Vec<EndpointPattern>>),
}

/// Subscription resources carried by a request and how many entries create.
struct Extracted<'a> {
    subscriptions: Vec<&'a Value>,
    posted: usize,
    limit_message: String,
}

fn extract(resource: &Value, operation: Option<TypeOperation>) -> Extracted<'_> {
    let limit_message = format!(
        "Number of active subscriptions are exceeding the limit of {}",
        MAX_ACTIVE_SUBSCRIPTIONS
    );
    match resource.get("resourceType").and_then(Value::as_str) {
        Some(SUBSCRIPTION) => Extracted {
            subscriptions: vec![resource],
            posted: usize::from(operation == Some(TypeOperation::Create)),
            limit_message,
        },
        Some(BUNDLE) => {
            let entries = resource
                .get("entry")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            // entries deleting or deactivating subscriptions are not credited
            let subscriptions = entries
                .iter()
                .filter_map(|entry| entry.get("resource"))
                .filter(|r| r.get("resourceType").and_then(Value::as_str) == Some(SUBSCRIPTION))
                .collect();
            let posted = entries
                .iter()
                .filter(|entry| entry.pointer("/request/method").and_then(Value::as_str) == Some("POST"))
                .count();
            Extracted {
                subscriptions,
                posted,
                limit_message: format!(
                    "{}. Please delete or deactivate subscriptions first, then create new Subscriptions in another request.",
                    limit_message
                ),
            }
        }
        _ => Extracted {
            subscriptions: Vec::new(),
            posted: 0,
            limit_message,
        },
    }
}

fn invalid(detail: &str) -> FhirError {
    FhirError::InvalidResource(format!(
        "Subscription resource is not valid. Error was: {}",
        detail
    ))
}

/// Checks the shape of a Subscription and returns its channel endpoint.
fn channel_endpoint(subscription: &Value) -> FhirResult<&str> {
    if subscription.get("status").and_then(Value::as_str).is_none() {
        return Err(invalid("status is required"));
    }
    if subscription.get("criteria").and_then(Value::as_str).is_none() {
        return Err(invalid("criteria is required"));
    }
    let channel = subscription
        .get("channel")
        .filter(|c| c.is_object())
        .ok_or_else(|| invalid("channel is required"))?;
    if channel.get("type").and_then(Value::as_str) != Some(REST_HOOK) {
        return Err(invalid("channel.type should be equal to 'rest-hook'"));
    }
    channel
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("channel.endpoint is required"))
}

/// [`Validator`] for Subscription resources and bundles carrying them.
pub struct SubscriptionValidator {
    persistence: Arc<dyn Persistence>,
    search: Arc<dyn Search>,
    allow_list: AllowList,
}

impl std::fmt::Debug for SubscriptionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionValidator")
            .field("backend", &self.persistence.backend_name())
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

impl SubscriptionValidator {
    /// Creates a validator.
    ///
    /// With `enable_multi_tenancy` the allow list is grouped by
    /// [`SubscriptionEndpoint::tenant_id`]; entries without a tenant are
    /// then unreachable.
    pub fn new(
        persistence: Arc<dyn Persistence>,
        search: Arc<dyn Search>,
        allow_list: Vec<SubscriptionEndpoint>,
        enable_multi_tenancy: bool,
    ) -> Self {
        let allow_list = if enable_multi_tenancy {
            let mut grouped: HashMap<String, Vec<EndpointPattern>> = HashMap::new();
            for entry in allow_list {
                if let Some(tenant_id) = entry.tenant_id {
                    grouped.entry(tenant_id).or_default().push(entry.endpoint);
                }
            }
            AllowList::PerTenant(grouped)
        } else {
            AllowList::Single(allow_list.into_iter().map(|e| e.endpoint).collect())
        };
        Self {
            persistence,
            search,
            allow_list,
        }
    }

    fn allow_list_for(&self, tenant_id: Option<&str>) -> FhirResult<&[EndpointPattern]> {
        match (&self.allow_list, tenant_id) {
            (AllowList::Single(list), None) => Ok(list),
            (AllowList::Single(_), Some(_)) => Err(FhirError::Internal(
                "This instance has multi-tenancy disabled, but the incoming request has a tenantId"
                    .to_string(),
            )),
            (AllowList::PerTenant(map), Some(tenant_id)) => {
                Ok(map.get(tenant_id).map(Vec::as_slice).unwrap_or_default())
            }
            (AllowList::PerTenant(_), None) => Err(FhirError::Internal(
                "This instance has multi-tenancy enabled, but the incoming request is missing tenantId"
                    .to_string(),
            )),
        }
    }
}

#[async_trait]
impl Validator for SubscriptionValidator {
    async fn validate(&self, resource: &Value, context: &ValidatorContext) -> FhirResult<()> {
        let extracted = extract(resource, context.type_operation);
        if extracted.subscriptions.is_empty() {
            return Ok(());
        }

        let tenant_id = context.tenant_id.as_deref();
        let active = self.persistence.get_active_subscriptions(tenant_id).await?.len();
        debug!(
            active,
            posted = extracted.posted,
            tenant = ?tenant_id,
            "Checking subscription limit"
        );
        if active + extracted.posted > MAX_ACTIVE_SUBSCRIPTIONS {
            return Err(FhirError::BadRequest(extracted.limit_message));
        }

        let allow_list = self.allow_list_for(tenant_id)?;
        for subscription in extracted.subscriptions {
            let endpoint = channel_endpoint(subscription)?;
            if !allow_list.iter().any(|allowed| allowed.matches(endpoint)) {
                return Err(FhirError::InvalidResource(format!(
                    "Subscription resource is not valid. Endpoint {} is not allow listed.",
                    endpoint
                )));
            }
            if let Some(criteria) = subscription.get("criteria").and_then(Value::as_str) {
                self.search.validate_subscription_search_criteria(criteria)?;
            }
        }
        Ok(())
    }
}

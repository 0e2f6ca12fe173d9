//! Resource validation.
//!
//! [`validate_resource`] is the single entry point used by the create and
//! update routes and by the transaction handler: it checks that the body is
//! of the type addressed by the request and then runs every configured
//! [`Validator`] in order, stopping at the first failure.

pub mod subscription;

pub use subscription::{EndpointPattern, SubscriptionEndpoint, SubscriptionValidator};

use std::sync::Arc;

use helios_interface::FhirError;
use helios_interface::core::{Validator, ValidatorContext};
use serde_json::Value;

use crate::error::RestResult;

/// Validates `resource` as a `resource_type`.
pub async fn validate_resource(
    validators: &[Arc<dyn Validator>],
    resource_type: &str,
    resource: &Value,
    context: &ValidatorContext,
) -> RestResult<()> {
    if resource.get("resourceType").and_then(Value::as_str) != Some(resource_type) {
        return Err(FhirError::InvalidResource(format!("not a valid '{}'", resource_type)).into());
    }
    for validator in validators {
        validator.validate(resource, context).await?;
    }
    Ok(())
}

//! Resource validation contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FhirResult;
use crate::operation::TypeOperation;

/// Information about the request being validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorContext {
    /// Tenant resolved for the request.
    pub tenant_id: Option<String>,
    /// Interaction carrying the resource.
    pub type_operation: Option<TypeOperation>,
}

/// Validates resources before they reach persistence.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Fails with [`FhirError::InvalidResource`](crate::FhirError::InvalidResource)
    /// when the resource is not acceptable.
    async fn validate(&self, resource: &Value, context: &ValidatorContext) -> FhirResult<()>;
}

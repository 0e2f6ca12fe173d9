//! Application state for the FHIR REST API.
//!
//! This module defines the shared application state that is available to all
//! request handlers: the FHIR profile with its backends, the server
//! configuration, and the resolvers derived from both at startup.

use std::sync::Arc;

use helios_interface::core::Authorization;
use helios_interface::{SystemOperation, TypeOperation};

use crate::bundle::BundleHandler;
use crate::capabilities::CapabilityResolver;
use crate::config::ServerConfig;
use crate::error::{RestError, RestResult};
use crate::handlers::ResourceHandler;
use crate::profile::FhirConfig;
use crate::routing::OperationDefinitionRegistry;
use crate::tenant::TenantResolver;

/// Shared application state for the REST API.
///
/// Everything is built once and shared behind [`Arc`]s; cloning is cheap.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
/// use helios_interface::{FhirVersion, TypeOperation};
/// use helios_rest::{AppState, ServerConfig};
/// use helios_rest::profile::FhirConfig;
///
/// let fhir = FhirConfig::from_backend(
///     FhirVersion::R4,
///     Arc::new(MemoryBackend::new()),
///     Arc::new(PassThroughAuthorization::default()),
/// );
/// let state = AppState::new(fhir, ServerConfig::for_testing());
/// assert!(state.resource_handler("Patient", TypeOperation::Read).is_ok());
/// ```
#[derive(Clone)]
pub struct AppState {
    fhir: Arc<FhirConfig>,
    config: Arc<ServerConfig>,
    capabilities: Arc<CapabilityResolver>,
    tenants: Arc<TenantResolver>,
    operations: Arc<OperationDefinitionRegistry>,
    bundle: BundleHandler,
}

impl AppState {
    /// Creates the state for `fhir` served with `config`.
    pub fn new(fhir: FhirConfig, config: ServerConfig) -> Self {
        let capabilities = Arc::new(CapabilityResolver::new(&fhir));
        let tenants = Arc::new(TenantResolver::new(config.multitenancy()));
        let operations = Arc::new(OperationDefinitionRegistry::from_profile(&fhir, &capabilities));
        let bundle = BundleHandler::new(&fhir, capabilities.clone(), config.max_bundle_entries);
        Self {
            fhir: Arc::new(fhir),
            config: Arc::new(config),
            capabilities,
            tenants,
            operations,
            bundle,
        }
    }

    /// Returns the FHIR profile.
    pub fn fhir(&self) -> &FhirConfig {
        &self.fhir
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the capability resolver.
    pub fn capabilities(&self) -> &CapabilityResolver {
        &self.capabilities
    }

    /// Returns the tenant resolver.
    pub fn tenants(&self) -> &TenantResolver {
        &self.tenants
    }

    /// Returns the mounted operation definitions.
    pub fn operations(&self) -> &OperationDefinitionRegistry {
        &self.operations
    }

    /// Returns the transaction bundle handler.
    pub fn bundle_handler(&self) -> &BundleHandler {
        &self.bundle
    }

    /// Returns the authorization backend.
    pub fn authorization(&self) -> &Arc<dyn Authorization> {
        &self.fhir.authorization
    }

    /// Returns the handler serving `operation` on `resource_type`.
    ///
    /// Special resources take precedence over the generic profile. A type or
    /// operation the server does not offer is reported as
    /// [`RestError::UnsupportedInteraction`].
    pub fn resource_handler(
        &self,
        resource_type: &str,
        operation: TypeOperation,
    ) -> RestResult<ResourceHandler> {
        if !self.capabilities.is_operation_supported(resource_type, operation) {
            return Err(RestError::UnsupportedInteraction {
                resource_type: resource_type.to_string(),
                interaction: operation.to_string(),
            });
        }

        let authorization = self.fhir.authorization.clone();
        let validators = self.fhir.validators.clone();
        if let Some(special) = self.fhir.resources.get(resource_type) {
            return Ok(ResourceHandler::special(
                resource_type,
                special,
                authorization,
                validators,
            ));
        }
        match &self.fhir.generic_resource {
            Some(generic) => Ok(ResourceHandler::generic(
                resource_type,
                generic,
                authorization,
                validators,
            )),
            None => Err(RestError::UnsupportedInteraction {
                resource_type: resource_type.to_string(),
                interaction: operation.to_string(),
            }),
        }
    }

    /// Fails unless `operation` is offered at the server root.
    pub fn ensure_system_operation(&self, operation: SystemOperation) -> RestResult<()> {
        if self.fhir.supports_system_operation(operation) {
            Ok(())
        } else {
            Err(self.unsupported_system_operation(operation))
        }
    }

    /// The 404 answered for a system operation the server does not offer.
    pub fn unsupported_system_operation(&self, operation: SystemOperation) -> RestError {
        RestError::UnsupportedInteraction {
            resource_type: "the server root".to_string(),
            interaction: operation.to_string(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("fhir", &self.fhir)
            .field("server_url", &self.config.server_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SpecialResource;
    use helios_interface::FhirVersion;
    use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};

    fn state() -> AppState {
        let backend = Arc::new(MemoryBackend::new());
        let fhir = FhirConfig::from_backend(
            FhirVersion::R4,
            backend.clone(),
            Arc::new(PassThroughAuthorization::default()),
        )
        .with_generic_operations(vec![TypeOperation::Read, TypeOperation::Create])
        .with_excluded_resources(FhirVersion::R4, ["Binary"])
        .with_resource(
            "Binary",
            SpecialResource {
                operations: vec![TypeOperation::Read],
                fhir_versions: vec![FhirVersion::R4],
                persistence: backend.clone(),
                type_search: backend.clone(),
                type_history: backend,
            },
        );
        AppState::new(fhir, ServerConfig::for_testing())
    }

    #[test]
    fn test_app_state_creation() {
        let state = state();
        assert_eq!(state.config().server_url(), "https://fhir.example.com");
        assert_eq!(state.bundle_handler().max_entries(), 25);
        assert!(!state.tenants().config().enable_multi_tenancy);
    }

    #[test]
    fn test_resource_handler_lookup() {
        let state = state();
        let handler = state
            .resource_handler("Patient", TypeOperation::Create)
            .unwrap();
        assert_eq!(handler.resource_type(), "Patient");
        assert!(state.resource_handler("Binary", TypeOperation::Read).is_ok());

        let err = state
            .resource_handler("Binary", TypeOperation::Create)
            .unwrap_err();
        assert!(matches!(err, RestError::UnsupportedInteraction { .. }));
        assert!(state.resource_handler("Patient", TypeOperation::Delete).is_err());
        assert!(state.resource_handler("NotAType", TypeOperation::Read).is_err());
    }

    #[test]
    fn test_system_operations() {
        let state = state();
        assert!(state.ensure_system_operation(SystemOperation::SearchSystem).is_ok());

        let backend = Arc::new(MemoryBackend::new());
        let fhir = FhirConfig::from_backend(
            FhirVersion::R4,
            backend,
            Arc::new(PassThroughAuthorization::default()),
        )
        .with_system_operations(vec![SystemOperation::Transaction]);
        let state = AppState::new(fhir, ServerConfig::for_testing());
        let err = state
            .ensure_system_operation(SystemOperation::HistorySystem)
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }
}

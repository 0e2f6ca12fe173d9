//! Operation definitions served next to the FHIR routes.
//!
//! Implementation guides define named operations (`$docref`, ...). The
//! server implements a fixed set of them; each one is mounted only when the
//! profile's compiled implementation guides declare its
//! `OperationDefinition`. For authorization an operation counts as an
//! existing interaction, so token verification sees e.g. `search-type` on
//! `DocumentReference` for `GET /DocumentReference/$docref`.

use axum::{
    Router,
    http::Method,
    routing::{MethodRouter, get},
};
use helios_interface::{Operation, TypeOperation};
use tracing::{info, warn};

use crate::capabilities::CapabilityResolver;
use crate::handlers::docref::{DOCUMENT_REFERENCE, docref_get_handler, docref_post_handler};
use crate::middleware::identity::RequestInformation;
use crate::profile::FhirConfig;
use crate::state::AppState;

/// Canonical URL of the US Core fetch DocumentReference operation.
pub const US_CORE_DOCREF: &str = "http://hl7.org/fhir/us/core/OperationDefinition/docref";

/// An operation the server implements.
#[derive(Clone)]
pub struct OperationDefinition {
    /// URL of the corresponding `OperationDefinition` resource.
    pub canonical_url: &'static str,
    /// Route path, without tenant prefix.
    pub path: &'static str,
    /// Methods the route answers.
    pub http_methods: Vec<Method>,
    /// Interaction used for authorization.
    pub request_information: RequestInformation,
    router: MethodRouter<AppState>,
}

impl std::fmt::Debug for OperationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDefinition")
            .field("canonical_url", &self.canonical_url)
            .field("path", &self.path)
            .field("http_methods", &self.http_methods)
            .finish()
    }
}

impl OperationDefinition {
    /// US Core `$docref`, a DocumentReference search.
    pub fn us_core_docref() -> Self {
        Self {
            canonical_url: US_CORE_DOCREF,
            path: "/DocumentReference/$docref",
            http_methods: vec![Method::GET, Method::POST],
            request_information: RequestInformation {
                operation: Operation::Type(TypeOperation::SearchType),
                resource_type: Some(DOCUMENT_REFERENCE.to_string()),
                id: None,
                vid: None,
            },
            router: get(docref_get_handler).post(docref_post_handler),
        }
    }

    /// Every operation the server knows how to serve.
    pub fn implemented() -> Vec<Self> {
        vec![Self::us_core_docref()]
    }

    fn is_servable(&self, capabilities: &CapabilityResolver) -> bool {
        match (
            self.request_information.operation,
            self.request_information.resource_type.as_deref(),
        ) {
            (Operation::Type(operation), Some(resource_type)) => {
                capabilities.is_operation_supported(resource_type, operation)
            }
            _ => false,
        }
    }
}

/// The operations mounted on this server.
#[derive(Clone, Default)]
pub struct OperationDefinitionRegistry {
    operations: Vec<OperationDefinition>,
}

impl std::fmt::Debug for OperationDefinitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.operations.iter().map(|op| op.canonical_url))
            .finish()
    }
}

impl OperationDefinitionRegistry {
    /// Registers `operations` whose underlying interaction the server
    /// offers. The others are skipped.
    pub fn new(capabilities: &CapabilityResolver, operations: Vec<OperationDefinition>) -> Self {
        let operations = operations
            .into_iter()
            .filter(|operation| {
                if operation.is_servable(capabilities) {
                    info!(
                        operation = operation.canonical_url,
                        path = operation.path,
                        "Enabling operation"
                    );
                    true
                } else {
                    warn!(
                        operation = operation.canonical_url,
                        "Failed to initialize operation. Is your FhirConfig correct?"
                    );
                    false
                }
            })
            .collect();
        Self { operations }
    }

    /// The implemented operations `fhir` declares.
    pub fn from_profile(fhir: &FhirConfig, capabilities: &CapabilityResolver) -> Self {
        let declared = OperationDefinition::implemented()
            .into_iter()
            .filter(|operation| fhir.declares_operation(operation.canonical_url))
            .collect();
        Self::new(capabilities, declared)
    }

    /// The operation served at `method` and `path`, if any.
    pub fn get_operation(&self, method: &Method, path: &str) -> Option<&OperationDefinition> {
        let path = path.trim_end_matches('/');
        self.operations
            .iter()
            .find(|op| op.path == path && op.http_methods.contains(method))
    }

    /// Returns true when no operation is mounted.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Routes of every mounted operation.
    pub fn routes(&self) -> Router<AppState> {
        self.operations
            .iter()
            .fold(Router::new(), |router, operation| {
                router.route(operation.path, operation.router.clone())
            })
    }
}

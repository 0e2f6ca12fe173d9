//! FHIR profile of the server.
//!
//! A [`FhirConfig`] describes which FHIR version is served, which resource
//! types and interactions are available, and which backend handles each of
//! them. It is assembled once at startup and shared read-only by every
//! request.
//!
//! Resource types fall in two groups:
//!
//! - **Generic** resources share one backend set and one operation list. Every
//!   type of the version's catalog is generic unless listed in the
//!   per-version exclusion list.
//! - **Special** resources carry their own backends and operations and take
//!   precedence over the generic profile.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use helios_interface::backends::{MemoryBackend, PassThroughAuthorization};
//! use helios_interface::FhirVersion;
//! use helios_rest::profile::FhirConfig;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let config = FhirConfig::from_backend(
//!     FhirVersion::R4,
//!     backend,
//!     Arc::new(PassThroughAuthorization::default()),
//! );
//! assert!(config.generic_resource.is_some());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use helios_interface::core::{Authorization, BundleService, History, Persistence, Search, Validator};
use helios_interface::{FhirVersion, SystemOperation, TypeOperation};
use serde_json::Value;

/// Backends and operations shared by every generic resource type.
#[derive(Clone)]
pub struct GenericResource {
    /// Interactions offered on every generic type.
    pub operations: Vec<TypeOperation>,
    /// STU3 types removed from the generic profile.
    pub excluded_stu3_resources: Vec<String>,
    /// R4 types removed from the generic profile.
    pub excluded_r4_resources: Vec<String>,
    /// Versions the generic profile applies to.
    pub fhir_versions: Vec<FhirVersion>,
    /// Single-resource backend.
    pub persistence: Arc<dyn Persistence>,
    /// Type search backend.
    pub type_search: Arc<dyn Search>,
    /// Type and instance history backend.
    pub type_history: Arc<dyn History>,
}

impl GenericResource {
    /// Returns the excluded types for `version`.
    pub fn excluded_for(&self, version: FhirVersion) -> &[String] {
        match version {
            FhirVersion::Stu3 => &self.excluded_stu3_resources,
            FhirVersion::R4 => &self.excluded_r4_resources,
        }
    }
}

/// A resource type with dedicated backends.
#[derive(Clone)]
pub struct SpecialResource {
    /// Interactions offered on this type.
    pub operations: Vec<TypeOperation>,
    /// Versions this entry applies to.
    pub fhir_versions: Vec<FhirVersion>,
    /// Single-resource backend.
    pub persistence: Arc<dyn Persistence>,
    /// Type search backend.
    pub type_search: Arc<dyn Search>,
    /// Type and instance history backend.
    pub type_history: Arc<dyn History>,
}

/// The complete FHIR profile of the server.
#[derive(Clone)]
pub struct FhirConfig {
    /// Version served.
    pub fhir_version: FhirVersion,
    /// Interactions offered at the server root.
    pub system_operations: Vec<SystemOperation>,
    /// Profile shared by generic resource types, if any.
    pub generic_resource: Option<GenericResource>,
    /// Resource types with dedicated backends, keyed by type name.
    pub resources: BTreeMap<String, SpecialResource>,
    /// Transaction backend.
    pub bundle: Arc<dyn BundleService>,
    /// System search backend.
    pub system_search: Arc<dyn Search>,
    /// System history backend.
    pub system_history: Arc<dyn History>,
    /// Authorization backend.
    pub authorization: Arc<dyn Authorization>,
    /// Validators run on every written resource, in order.
    pub validators: Vec<Arc<dyn Validator>>,
    /// Conformance resources of the loaded implementation guides. An
    /// `OperationDefinition` listed here enables its route when the server
    /// implements it.
    pub compiled_implementation_guides: Vec<Value>,
}

impl fmt::Debug for FhirConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FhirConfig")
            .field("fhir_version", &self.fhir_version)
            .field("system_operations", &self.system_operations)
            .field(
                "generic_operations",
                &self.generic_resource.as_ref().map(|g| &g.operations),
            )
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.len())
            .field(
                "compiled_implementation_guides",
                &self.compiled_implementation_guides.len(),
            )
            .finish()
    }
}

impl FhirConfig {
    /// Builds a profile served entirely by one backend.
    ///
    /// Every type of the version's catalog is generic and offers every
    /// interaction; transactions, system search and system history are
    /// enabled.
    pub fn from_backend<B>(
        fhir_version: FhirVersion,
        backend: Arc<B>,
        authorization: Arc<dyn Authorization>,
    ) -> Self
    where
        B: Persistence + Search + History + BundleService + 'static,
    {
        Self {
            fhir_version,
            system_operations: vec![
                SystemOperation::Transaction,
                SystemOperation::Batch,
                SystemOperation::SearchSystem,
                SystemOperation::HistorySystem,
            ],
            generic_resource: Some(GenericResource {
                operations: TypeOperation::ALL.to_vec(),
                excluded_stu3_resources: Vec::new(),
                excluded_r4_resources: Vec::new(),
                fhir_versions: vec![fhir_version],
                persistence: backend.clone(),
                type_search: backend.clone(),
                type_history: backend.clone(),
            }),
            resources: BTreeMap::new(),
            bundle: backend.clone(),
            system_search: backend.clone(),
            system_history: backend,
            authorization,
            validators: Vec::new(),
            compiled_implementation_guides: Vec::new(),
        }
    }

    /// Replaces the generic operation list.
    pub fn with_generic_operations(mut self, operations: Vec<TypeOperation>) -> Self {
        if let Some(generic) = self.generic_resource.as_mut() {
            generic.operations = operations;
        }
        self
    }

    /// Excludes `resource_types` from the generic profile of `version`.
    pub fn with_excluded_resources<I, S>(mut self, version: FhirVersion, resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(generic) = self.generic_resource.as_mut() {
            let list = match version {
                FhirVersion::Stu3 => &mut generic.excluded_stu3_resources,
                FhirVersion::R4 => &mut generic.excluded_r4_resources,
            };
            list.extend(resource_types.into_iter().map(Into::into));
        }
        self
    }

    /// Removes the generic profile altogether.
    pub fn without_generic_resources(mut self) -> Self {
        self.generic_resource = None;
        self
    }

    /// Registers a special resource type.
    pub fn with_resource(mut self, resource_type: impl Into<String>, resource: SpecialResource) -> Self {
        self.resources.insert(resource_type.into(), resource);
        self
    }

    /// Replaces the system operation list.
    pub fn with_system_operations(mut self, operations: Vec<SystemOperation>) -> Self {
        self.system_operations = operations;
        self
    }

    /// Replaces the transaction backend.
    pub fn with_bundle_service(mut self, bundle: Arc<dyn BundleService>) -> Self {
        self.bundle = bundle;
        self
    }

    /// Appends a validator.
    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validators.push(validator);
        self
    }

    /// Replaces the compiled implementation guide resources.
    pub fn with_implementation_guides(mut self, resources: Vec<Value>) -> Self {
        self.compiled_implementation_guides = resources;
        self
    }

    /// Returns true if an `OperationDefinition` with `canonical_url` is
    /// among the compiled implementation guides.
    pub fn declares_operation(&self, canonical_url: &str) -> bool {
        self.compiled_implementation_guides.iter().any(|resource| {
            resource.get("resourceType").and_then(Value::as_str) == Some("OperationDefinition")
                && resource.get("url").and_then(Value::as_str) == Some(canonical_url)
        })
    }

    /// Returns true if `operation` is offered at the server root.
    pub fn supports_system_operation(&self, operation: SystemOperation) -> bool {
        self.system_operations.contains(&operation)
    }
}

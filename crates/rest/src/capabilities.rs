//! Capability resolution.
//!
//! Answers "which resource types and interactions does this server offer"
//! from the static [`FhirConfig`]. The result is computed once when the
//! application is built and consulted by routing and by the bundle handler.

use std::collections::{BTreeMap, BTreeSet};

use helios_interface::{FhirVersion, TypeOperation};

use crate::fhir_types::get_resource_type_names;
use crate::profile::FhirConfig;

/// Resource types and interactions offered by the server.
#[derive(Debug, Clone)]
pub struct CapabilityResolver {
    fhir_version: FhirVersion,
    generic_versions: Vec<FhirVersion>,
    generic_operations: Vec<TypeOperation>,
    excluded_stu3: BTreeSet<String>,
    excluded_r4: BTreeSet<String>,
    special: BTreeMap<String, Vec<TypeOperation>>,
}

impl CapabilityResolver {
    /// Builds the resolver for the configured version.
    pub fn new(config: &FhirConfig) -> Self {
        let (generic_versions, generic_operations, excluded_stu3, excluded_r4) =
            match &config.generic_resource {
                Some(generic) => (
                    generic.fhir_versions.clone(),
                    generic.operations.clone(),
                    generic.excluded_stu3_resources.iter().cloned().collect(),
                    generic.excluded_r4_resources.iter().cloned().collect(),
                ),
                None => (Vec::new(), Vec::new(), BTreeSet::new(), BTreeSet::new()),
            };

        let special = config
            .resources
            .iter()
            .filter(|(_, resource)| resource.fhir_versions.contains(&config.fhir_version))
            .map(|(name, resource)| (name.clone(), resource.operations.clone()))
            .collect();

        Self {
            fhir_version: config.fhir_version,
            generic_versions,
            generic_operations,
            excluded_stu3,
            excluded_r4,
            special,
        }
    }

    /// The version the server is configured for.
    pub fn fhir_version(&self) -> FhirVersion {
        self.fhir_version
    }

    /// Types served by the generic profile: the catalog minus exclusions.
    pub fn generic_resource_types(&self, version: FhirVersion) -> Vec<String> {
        if !self.generic_versions.contains(&version) {
            return Vec::new();
        }
        let excluded = match version {
            FhirVersion::Stu3 => &self.excluded_stu3,
            FhirVersion::R4 => &self.excluded_r4,
        };
        get_resource_type_names(version)
            .iter()
            .filter(|name| !excluded.contains(**name))
            .map(|name| name.to_string())
            .collect()
    }

    /// Every type the server answers for under `version`.
    pub fn supported_resource_types(&self, version: FhirVersion) -> BTreeSet<String> {
        let mut types: BTreeSet<String> =
            self.generic_resource_types(version).into_iter().collect();
        if version == self.fhir_version {
            types.extend(self.special.keys().cloned());
        }
        types
    }

    /// Returns true if `resource_type` has dedicated backends.
    pub fn is_special(&self, resource_type: &str) -> bool {
        self.special.contains_key(resource_type)
    }

    /// Interactions offered on `resource_type`, or `None` if the type is not
    /// served. A special entry wins over the generic profile.
    pub fn operations_for(&self, resource_type: &str) -> Option<&[TypeOperation]> {
        if let Some(operations) = self.special.get(resource_type) {
            return Some(operations);
        }
        if self.is_generic(resource_type) {
            return Some(&self.generic_operations);
        }
        None
    }

    /// Returns true if `operation` is offered on `resource_type`.
    pub fn is_operation_supported(&self, resource_type: &str, operation: TypeOperation) -> bool {
        self.operations_for(resource_type)
            .is_some_and(|ops| ops.contains(&operation))
    }

    /// For each requested type, the requested operations the server does not
    /// offer. Types with nothing missing are left out.
    pub fn unsupported_operations(
        &self,
        requested: &BTreeMap<String, Vec<TypeOperation>>,
    ) -> BTreeMap<String, Vec<TypeOperation>> {
        requested
            .iter()
            .filter_map(|(resource_type, operations)| {
                let missing: Vec<TypeOperation> = operations
                    .iter()
                    .copied()
                    .filter(|op| !self.is_operation_supported(resource_type, *op))
                    .collect();
                (!missing.is_empty()).then(|| (resource_type.clone(), missing))
            })
            .collect()
    }

    /// Like [`unsupported_operations`](Self::unsupported_operations), but only
    /// the generic profile counts.
    ///
    /// Transactions go to the single generic bundle backend, so special and
    /// unknown types report every requested operation as unsupported.
    pub fn unsupported_generic_operations(
        &self,
        requested: &BTreeMap<String, Vec<TypeOperation>>,
    ) -> BTreeMap<String, Vec<TypeOperation>> {
        requested
            .iter()
            .filter_map(|(resource_type, operations)| {
                let generic = !self.is_special(resource_type) && self.is_generic(resource_type);
                let missing: Vec<TypeOperation> = operations
                    .iter()
                    .copied()
                    .filter(|op| !generic || !self.generic_operations.contains(op))
                    .collect();
                (!missing.is_empty()).then(|| (resource_type.clone(), missing))
            })
            .collect()
    }

    fn is_generic(&self, resource_type: &str) -> bool {
        if !self.generic_versions.contains(&self.fhir_version) {
            return false;
        }
        let excluded = match self.fhir_version {
            FhirVersion::Stu3 => &self.excluded_stu3,
            FhirVersion::R4 => &self.excluded_r4,
        };
        !excluded.contains(resource_type)
            && get_resource_type_names(self.fhir_version)
                .iter()
                .any(|name| *name == resource_type)
    }
}

/// Renders the capability failure reported for bundles.
///
/// `{"Patient": [create, read]}` becomes
/// `Server does not support these resource and operations: {Patient: create,read}`.
pub fn format_unsupported(unsupported: &BTreeMap<String, Vec<TypeOperation>>) -> String {
    let body = unsupported
        .iter()
        .map(|(resource_type, operations)| {
            let ops: Vec<&str> = operations.iter().map(|op| op.as_str()).collect();
            format!("{}: {}", resource_type, ops.join(","))
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("Server does not support these resource and operations: {{{}}}", body)
}

//! FHIR interactions and versions understood by the façade.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A type- or instance-level FHIR interaction.
///
/// Serialized using the FHIR interaction codes (`history-type`, `search-type`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeOperation {
    /// `POST [base]/[type]`
    Create,
    /// `GET [base]/[type]/[id]`
    Read,
    /// `GET [base]/[type]/[id]/_history/[vid]`
    #[serde(rename = "vread")]
    VRead,
    /// `PUT [base]/[type]/[id]`
    Update,
    /// `PATCH [base]/[type]/[id]`
    Patch,
    /// `DELETE [base]/[type]/[id]`
    Delete,
    /// `GET [base]/[type]/_history`
    HistoryType,
    /// `GET [base]/[type]/[id]/_history`
    HistoryInstance,
    /// `GET [base]/_history`
    HistorySystem,
    /// `GET [base]/[type]?params`
    SearchType,
    /// `GET [base]?params`
    SearchSystem,
}

impl TypeOperation {
    /// All interactions, in declaration order.
    pub const ALL: [TypeOperation; 11] = [
        TypeOperation::Create,
        TypeOperation::Read,
        TypeOperation::VRead,
        TypeOperation::Update,
        TypeOperation::Patch,
        TypeOperation::Delete,
        TypeOperation::HistoryType,
        TypeOperation::HistoryInstance,
        TypeOperation::HistorySystem,
        TypeOperation::SearchType,
        TypeOperation::SearchSystem,
    ];

    /// Returns the FHIR interaction code.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeOperation::Create => "create",
            TypeOperation::Read => "read",
            TypeOperation::VRead => "vread",
            TypeOperation::Update => "update",
            TypeOperation::Patch => "patch",
            TypeOperation::Delete => "delete",
            TypeOperation::HistoryType => "history-type",
            TypeOperation::HistoryInstance => "history-instance",
            TypeOperation::HistorySystem => "history-system",
            TypeOperation::SearchType => "search-type",
            TypeOperation::SearchSystem => "search-system",
        }
    }

    /// Returns true for interactions whose results are passed through
    /// read-response authorization filtering.
    pub fn is_read_class(&self) -> bool {
        matches!(
            self,
            TypeOperation::Read
                | TypeOperation::VRead
                | TypeOperation::HistoryType
                | TypeOperation::HistoryInstance
                | TypeOperation::HistorySystem
                | TypeOperation::SearchType
                | TypeOperation::SearchSystem
        )
    }

    /// Returns true for interactions that modify stored data.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            TypeOperation::Create
                | TypeOperation::Update
                | TypeOperation::Patch
                | TypeOperation::Delete
        )
    }
}

impl fmt::Display for TypeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeOperation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("Unknown interaction: {}", s))
    }
}

/// A system-level FHIR interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemOperation {
    /// `POST [base]` with a transaction Bundle.
    Transaction,
    /// `POST [base]` with a batch Bundle.
    Batch,
    /// `GET [base]?params`
    SearchSystem,
    /// `GET [base]/_history`
    HistorySystem,
}

impl SystemOperation {
    /// Returns the FHIR interaction code.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemOperation::Transaction => "transaction",
            SystemOperation::Batch => "batch",
            SystemOperation::SearchSystem => "search-system",
            SystemOperation::HistorySystem => "history-system",
        }
    }
}

impl fmt::Display for SystemOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any interaction a request can map to, used when verifying access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operation {
    /// A type- or instance-level interaction.
    Type(TypeOperation),
    /// A system-level interaction.
    System(SystemOperation),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Type(op) => op.fmt(f),
            Operation::System(op) => op.fmt(f),
        }
    }
}

/// FHIR versions the façade can be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FhirVersion {
    /// FHIR STU3.
    #[serde(rename = "3.0.1")]
    Stu3,
    /// FHIR R4.
    #[default]
    #[serde(rename = "4.0.1")]
    R4,
}

impl FhirVersion {
    /// Returns the version string (`3.0.1`, `4.0.1`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersion::Stu3 => "3.0.1",
            FhirVersion::R4 => "4.0.1",
        }
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3.0.1" | "STU3" | "stu3" => Ok(FhirVersion::Stu3),
            "4.0.1" | "R4" | "r4" => Ok(FhirVersion::R4),
            other => Err(format!("Unsupported FHIR version: {}", other)),
        }
    }
}

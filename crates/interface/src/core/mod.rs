//! Backend capability traits.
//!
//! The façade never branches on backend identity: every collaborator is
//! reached through one of these object-safe traits.
//!
//! | Trait | Role |
//! |-------|------|
//! | [`Persistence`] | Single-resource CRUD |
//! | [`Search`] | Type and system search |
//! | [`History`] | Instance, type and system history |
//! | [`BundleService`] | Atomic multi-operation transactions |
//! | [`Authorization`] | Token verification and access decisions |
//! | [`Validator`] | Resource validation |

mod authorization;
mod bundle;
mod persistence;
mod search;
mod validator;

pub use authorization::Authorization;
pub use bundle::{
    BatchReadWriteRequest, BatchReadWriteResponse, BundleErrorKind, BundleReference,
    BundleService, BundleServiceResponse, TransactionRequest,
};
pub use persistence::Persistence;
pub use search::{
    ComparisonOperator, GlobalHistoryRequest, GlobalSearchRequest, History,
    InstanceHistoryRequest, LogicalOperator, QueryParams, Search, SearchEntry, SearchFilter,
    SearchResponse, SearchResult, TypeHistoryRequest, TypeSearchRequest,
};
pub use validator::{Validator, ValidatorContext};

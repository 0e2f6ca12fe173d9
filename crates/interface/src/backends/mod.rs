//! Reference backend implementations.
//!
//! - [`memory`] - In-process store implementing every data contract (feature `memory`)
//! - [`PassThroughAuthorization`] - Authorization that allows every request

#[cfg(feature = "memory")]
pub mod memory;
mod pass_through;

#[cfg(feature = "memory")]
pub use memory::MemoryBackend;
pub use pass_through::PassThroughAuthorization;

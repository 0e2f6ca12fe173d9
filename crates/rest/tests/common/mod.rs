//! Common test utilities for REST API testing.
//!
//! This module provides test infrastructure including:
//!
//! - [`harness`] - REST API test harness over the in-memory backend
//! - [`doubles`] - Scripted authorization and bundle backends
//! - [`fixtures`] - Test data fixtures
//! - [`assertions`] - HTTP response assertions

#![allow(dead_code)]

pub mod assertions;
pub mod doubles;
pub mod fixtures;
pub mod harness;

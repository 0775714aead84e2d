//! Common test utilities for cfgsync-import
//!
//! This module provides shared test infrastructure including:
//! - Storage builders for creating test fixtures
//! - Mock extension lifecycle and failure-injecting storage
//! - Assertion helpers for step ordering

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use mocks::*;

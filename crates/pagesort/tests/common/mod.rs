//! Shared test utilities for pagesort integration tests.
//!
//! - `TestHarness` owns a temp directory with a scanned PDF and opens
//!   pipelines on it
//! - fakes stand in for the external collaborators
//! - builders produce records at a given stage

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::{page_count, TestHarness};

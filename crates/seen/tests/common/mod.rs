//! Shared test utilities for seen integration tests.
//!
//! This module provides:
//! - `TestHarness`: a running engine over a temp storage root and SQLite store
//! - `FakeInvoker`: scripted tool outcomes that record every call
//! - `CountingStore`: a store wrapper that counts every access

pub mod fakes;
pub mod harness;

pub use fakes::{CountingStore, FakeInvoker};
pub use harness::TestHarness;

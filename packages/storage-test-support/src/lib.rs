//! Storage test support utilities
//!
//! Shared helpers for the storage crate's unit and integration tests:
//! unified logging initialization, test environment loading, and throwaway
//! migration directories.

pub mod env;
pub mod logging;
pub mod migrations;

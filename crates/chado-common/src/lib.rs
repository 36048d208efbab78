//! chado-tools common library
//!
//! Shared types and utilities used across the chado-tools workspace:
//!
//! - **Logging**: centralized tracing setup for the CLI and the engine
//! - **Types**: shared domain types (pagination, schema version labels)

pub mod logging;
pub mod types;

pub use types::{Pagination, SchemaVersion};

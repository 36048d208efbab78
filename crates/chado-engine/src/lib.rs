//! chado-engine
//!
//! Schema-aware data-exchange and query engine for CHADO databases.
//!
//! The engine maps structured external data to and from the tables of a
//! fixed but versioned relational schema, enforcing the referential and
//! semantic invariants a generic SQL client cannot express:
//!
//! - **Connection management** ([`db`]): pooled PostgreSQL connections and
//!   scoped transactions with guaranteed release.
//! - **Schema registry** ([`schema`]): in-memory descriptions of each
//!   supported CHADO revision, validated against the live database.
//! - **Record mapping** ([`record`]): delimited text to typed rows and back.
//! - **Import** ([`import`]): transactional bulk loading with natural-key
//!   foreign-key resolution and per-record failure reporting.
//! - **Export** ([`export`]): streamed, schema-aware query results.
//! - **Query engine** ([`query`]): registered parameterized join templates
//!   with stable pagination.
//! - **Admin operations** ([`admin`]): direct insert/delete of single
//!   entities such as organisms.

pub mod admin;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod query;
pub mod record;
pub mod schema;

pub use db::{acquire, create_pool, with_transaction, ConnectionHandle, DbConfig};
pub use sqlx::PgPool;
pub use error::{EngineError, EngineResult};
pub use query::QueryEngine;
pub use record::{Record, Value};
pub use schema::SchemaRegistry;

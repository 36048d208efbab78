//! Engine error types
//!
//! One error enum covers every failure mode of the engine contracts.
//! Per-record failures inside a batch (malformed input rows, unresolved
//! references) are recovered locally and aggregated into the batch result;
//! everything else aborts the current unit of work and carries the
//! offending context (table name, record index, constraint name).

use thiserror::Error;

use crate::schema::SchemaDiff;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Main error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Live database does not match any supported schema revision
    #[error("Schema mismatch: no supported CHADO revision matches the database. Closest is {closest}: {diff}")]
    SchemaMismatch { closest: String, diff: SchemaDiff },

    /// Requested table is not part of the schema
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    /// Connection pool had no free connection within the acquire timeout
    #[error("Connection pool exhausted: no connection became available within {timeout_secs}s")]
    PoolExhausted { timeout_secs: u64 },

    /// External input row failed structural or type validation
    #[error("Malformed input at row {row}, column '{column}': {reason}")]
    MalformedInput {
        row: usize,
        column: String,
        reason: String,
    },

    /// Backend value could not be converted to the declared column type
    #[error("Cannot convert value in column '{column}' to {expected}: {reason}")]
    TypeCoercionError {
        column: String,
        expected: String,
        reason: String,
    },

    /// A natural-key reference did not resolve to a row in the referenced table
    #[error("Unresolved reference in column '{column}': no {referenced_table} named '{natural_key}'")]
    UnresolvedReference {
        column: String,
        referenced_table: String,
        natural_key: String,
    },

    /// Insert violated a database-level constraint; the batch was rolled back
    #[error("Integrity violation on table '{table}' at record {record_index}: {constraint}")]
    IntegrityViolation {
        table: String,
        record_index: usize,
        constraint: String,
    },

    /// Query template parameter missing, unknown, or of the wrong type
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A query template with this name is already registered
    #[error("Query template '{0}' is already registered")]
    DuplicateTemplate(String),

    /// No query template registered under this name
    #[error("No query template named '{0}'")]
    UnknownTemplate(String),

    /// Transaction exceeded its wall-clock budget and was rolled back
    #[error("Transaction timed out after {timeout_secs}s and was rolled back")]
    TransactionTimeout { timeout_secs: u64 },

    /// Underlying database driver error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error while reading input or writing output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection configuration is invalid or missing
    #[error("Configuration error: {0}. Check CHADO_DATABASE_URL or the connection file.")]
    Config(String),
}

impl EngineError {
    /// Create a malformed-input error with row/column context
    pub fn malformed(row: usize, column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a type-coercion error with column context
    pub fn coercion(
        column: impl Into<String>,
        expected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypeCoercionError {
            column: column.into(),
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this failure is recoverable at the record level within a batch
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput { .. } | Self::UnresolvedReference { .. }
        )
    }
}

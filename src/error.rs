//! Error types for hartodb
//!
//! Provides a unified error type for all operations, grouped by the
//! classification an entry point reports back to its caller.

use thiserror::Error;

/// Result type alias using HartoError
pub type Result<T> = std::result::Result<T, HartoError>;

/// Unified error type for hartodb operations
#[derive(Debug, Error)]
pub enum HartoError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors (raised before any file is touched)
    // -------------------------------------------------------------------------
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Schema {0} already exists")]
    SchemaExists(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Field '{field}' of type '{field_type}' must have a length of {expected}, got {actual}")]
    InvalidFieldWidth {
        field: String,
        field_type: String,
        expected: String,
        actual: usize,
    },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Field '{0}' is required but not provided")]
    MissingField(String),

    #[error("Field '{field}' expects a {expected} value, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Field '{0}' does not exist in the table")]
    UnknownField(String),

    #[error("Field '{0}' cannot be written")]
    ImmutableField(String),

    // -------------------------------------------------------------------------
    // Not-Found Errors
    // -------------------------------------------------------------------------
    #[error("Schema {0} does not exist")]
    SchemaNotFound(String),

    #[error("Table {table} does not exist in schema {schema}")]
    TableNotFound { schema: String, table: String },

    #[error("Record {0} not found")]
    RecordNotFound(u64),

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("Invalid reference range {start}..{end} (side file is {len} bytes)")]
    InvalidRefRange { start: u64, end: u64, len: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Transaction Errors
    // -------------------------------------------------------------------------
    #[error("Transaction {txn_id} is {state} and cannot be used")]
    TransactionClosed { txn_id: u64, state: String },

    #[error("Transaction {txn_id} failed after applying {applied} of {total} operations: {source}")]
    PartialCommit {
        txn_id: u64,
        applied: usize,
        total: usize,
        #[source]
        source: Box<HartoError>,
    },

    // -------------------------------------------------------------------------
    // Worker Errors
    // -------------------------------------------------------------------------
    #[error("Cleanup worker error: {0}")]
    Worker(String),
}

/// Who is at fault for a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input or a missing schema/table/record
    Client,

    /// Filesystem failure, corruption, or an internal fault
    Server,
}

impl HartoError {
    /// Classify the error for reporting to an entry point
    pub fn class(&self) -> ErrorClass {
        match self {
            HartoError::InvalidName(_)
            | HartoError::SchemaExists(_)
            | HartoError::TableExists(_)
            | HartoError::InvalidFieldWidth { .. }
            | HartoError::DuplicateField(_)
            | HartoError::MissingField(_)
            | HartoError::TypeMismatch { .. }
            | HartoError::UnknownField(_)
            | HartoError::ImmutableField(_)
            | HartoError::SchemaNotFound(_)
            | HartoError::TableNotFound { .. }
            | HartoError::RecordNotFound(_)
            | HartoError::TransactionClosed { .. } => ErrorClass::Client,

            HartoError::Io(_)
            | HartoError::MalformedRecord { .. }
            | HartoError::InvalidRefRange { .. }
            | HartoError::Serialization(_)
            | HartoError::PartialCommit { .. }
            | HartoError::Worker(_) => ErrorClass::Server,
        }
    }

    /// True for corruption errors that are reported per record during scans
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            HartoError::MalformedRecord { .. } | HartoError::InvalidRefRange { .. }
        )
    }
}

impl From<serde_json::Error> for HartoError {
    fn from(e: serde_json::Error) -> Self {
        HartoError::Serialization(e.to_string())
    }
}

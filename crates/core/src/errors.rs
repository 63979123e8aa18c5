//! Error types for the clinic store.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors from the flat-file entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table directory or file could not be created or read.
    #[error("storage unavailable at '{}': {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the table file failed. The previous contents are untouched.
    #[error("failed to write table file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A field could not be parsed into its typed value.
    #[error("malformed value in {table} row {row}, column '{column}': '{value}' ({reason})")]
    MalformedValue {
        table: String,
        row: usize,
        column: String,
        value: String,
        reason: String,
    },

    /// A row has fewer fields than the table requires and the store is
    /// configured to reject such rows.
    #[error("{table} row {row} has {found} field(s), expected at least {expected}")]
    ShortRow {
        table: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    /// The flat file was written but the relational mirror could not be
    /// updated. The two copies now differ until the next successful mirror.
    #[error("table '{table}' written, but mirroring failed: {source}")]
    Mirror {
        table: String,
        #[source]
        source: MirrorError,
    },

    /// The table name is not one the store knows about.
    #[error("unknown table: {0}")]
    UnknownTable(String),
}

impl StoreError {
    /// `true` when the flat file holds the new state but the mirror does not.
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::Mirror { .. })
    }
}

// ---------------------------------------------------------------------------
// Field decode errors
// ---------------------------------------------------------------------------

/// A single field failed to decode. The store attaches table and row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("column '{column}': '{value}' ({reason})")]
pub struct FieldError {
    pub column: String,
    pub value: String,
    pub reason: String,
}

impl FieldError {
    pub fn new(column: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn into_store_error(self, table: &str, row: usize) -> StoreError {
        StoreError::MalformedValue {
            table: table.to_string(),
            row,
            column: self.column,
            value: self.value,
            reason: self.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Mirror errors
// ---------------------------------------------------------------------------

/// Errors from the relational mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The configured driver is not compiled into this build.
    #[error("relational driver '{0}' is not available in this build")]
    DriverUnavailable(String),

    /// Opening a connection failed.
    #[error("failed to connect to {target}: {detail}")]
    Connect { target: String, detail: String },

    /// Underlying rusqlite error.
    #[error("sqlite mirror error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Underlying MySQL client error.
    #[cfg(feature = "mysql")]
    #[error("mysql mirror error: {0}")]
    MySql(#[from] mysql::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

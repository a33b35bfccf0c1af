//! Error types for fk-core

use thiserror::Error;

/// Core error type for fkplan
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E003: Invalid configuration value
    #[error("[E003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// E005: IO error with file path context
    #[error("[E005] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E006: YAML parse error
    #[error("[E006] YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // Schema snapshot errors (S001-S009)
    /// S001: Failed to parse a schema snapshot file
    #[error("[S001] Failed to parse schema file {path}: {details}")]
    SchemaParseError { path: String, details: String },

    /// S002: The same table is declared twice
    #[error("[S002] Duplicate table '{table}'")]
    DuplicateTable { table: String },

    /// S003: The same column is declared twice within one table
    #[error("[S003] Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// S004: A primary key names a column the table does not declare
    #[error("[S004] Primary key of '{table}' names unknown column '{column}'")]
    UnknownPrimaryKeyColumn { table: String, column: String },

    /// S005: A foreign key points at a table missing from the schema
    #[error("[S005] Dangling foreign key: column '{column}' of '{table}' references unknown table '{target}'")]
    DanglingForeignKey {
        table: String,
        column: String,
        target: String,
    },

    /// S006: Columns of one foreign-key group reference different tables
    #[error("[S006] Foreign key group '{group}' on '{table}' references both '{first}' and '{second}'")]
    MixedForeignKeyGroup {
        table: String,
        group: String,
        first: String,
        second: String,
    },

    /// S007: An identifier is empty or malformed
    #[error("[S007] Invalid identifier in {context}: '{value}'")]
    InvalidIdentifier { context: String, value: String },

    /// S008: The same column is listed twice in a primary key
    #[error("[S008] Primary key of '{table}' lists column '{column}' more than once")]
    DuplicatePrimaryKeyColumn { table: String, column: String },

    /// S009: A foreign key points at a table without a primary key
    #[error("[S009] Foreign key column '{column}' of '{table}' references '{target}', which has no primary key")]
    KeylessForeignKeyTarget {
        table: String,
        column: String,
        target: String,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

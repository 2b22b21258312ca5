use thiserror::Error;

/// Core error type for keel operations.
#[derive(Error, Debug)]
pub enum KeelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Table {table} column {column}: unsupported column type {column_type}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        column_type: String,
    },

    #[error("Hook failed on {operation}: {message}")]
    Hook { operation: String, message: String },

    #[error("Failed to apply {operation}: {message}")]
    Apply { operation: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl KeelError {
    /// Build a hook failure for the given operation kind.
    pub fn hook(operation: impl ToString, message: impl ToString) -> Self {
        KeelError::Hook {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for KeelError {
    fn from(e: serde_json::Error) -> Self {
        KeelError::Serialization(e.to_string())
    }
}

/// Result type alias using KeelError.
pub type Result<T> = std::result::Result<T, KeelError>;

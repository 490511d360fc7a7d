use thiserror::Error;

/// Main error type for tog
#[derive(Error, Debug)]
pub enum TogError {
    /// Graph store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Oracle (chat completion) transport errors
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Graph import / lookup errors
    #[error("Graph error: {0}")]
    Graph(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using TogError
pub type Result<T> = std::result::Result<T, TogError>;

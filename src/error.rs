use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnakeLspError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("query error: {0}")]
    Query(String),
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("file not tracked: {0}")]
    FileNotFound(String),
    #[error("module not resolved: {0}")]
    ModuleNotResolved(String),
    #[error("symbol not found")]
    SymbolNotFound,
    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SnakeLspError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosmonError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0}s")]
    NavigationTimeout(u64),

    #[error("Timed out after {secs}s waiting for '{selector}'")]
    TableTimeout { selector: String, secs: u64 },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("HTML parsing error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PosmonError>;

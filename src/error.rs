use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Remote store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, AppError>;

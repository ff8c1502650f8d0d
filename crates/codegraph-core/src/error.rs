use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace.
///
/// Parser errors are recorded and swallowed per file by the orchestrator;
/// everything else propagates through `Result` in the usual way.
#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("graph storage connection error: {0}")]
    StorageConnection(String),

    #[error("graph storage operation error: {0}")]
    StorageOperation(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("model load error: {0}")]
    ModelLoad(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("LLM API connection error: {0}")]
    ApiConnection(String),

    #[error("LLM API model error: {0}")]
    ApiModel(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CodeGraphError>;

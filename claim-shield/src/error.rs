use thiserror::Error;

#[derive(Error, Debug)]
pub enum FraudError {
    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Embedding component {position} is not finite")]
    NonFiniteEmbedding { position: usize },

    #[error("External call '{operation}' timed out after {timeout_ms}ms")]
    ExternalTimeout { operation: String, timeout_ms: u64 },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Embedding provider failed: {0}")]
    Embedding(String),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Report generation failed: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FraudError>;

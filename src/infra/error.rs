use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("environment error: {0}")]
    Environment(String),

    #[error("transcript I/O failed: {0}")]
    Transcript(#[from] std::io::Error),

    #[error("transcript timestamp: {0}")]
    Timestamp(String),

    #[error("invalid value {value:?} for {key}")]
    Config { key: String, value: String },

    #[error("malformed sandbox layout: {0}")]
    Layout(String),
}

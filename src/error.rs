use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Empty chain — no genesis block")]
    EmptyChain,

    #[error("Invalid proof: {0} (must be a positive integer)")]
    InvalidProof(i64),

    #[error("Invalid previous proof: {0} (must be a positive integer)")]
    InvalidPreviousProof(i64),

    #[error("No proof found for previous proof {previous_proof} after {attempts} attempts")]
    AttemptsExhausted { previous_proof: i64, attempts: u64 },

    #[error("Mining cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ChainError>;

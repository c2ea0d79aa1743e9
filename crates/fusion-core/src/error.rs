use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    /// Rejected input: empty point set, mixed keys, weights that do not sum to 1.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Threshold or weight tables that violate their invariants.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FusionError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        FusionError::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        FusionError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, FusionError>;

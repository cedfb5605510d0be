use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid schedule expression `{expr}`: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_schedule(expr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            expr: expr.into(),
            reason: reason.into(),
        }
    }

    /// Structural failures are surfaced to callers instead of being logged and skipped.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidSchedule { .. } | Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

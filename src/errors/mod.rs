use thiserror::Error;

/// Typed error hierarchy for renobot.
///
/// Use at module boundaries (completion calls, platform calls, parsing).
/// Internal/leaf functions can continue using `anyhow::Result` — the `Internal`
/// variant allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum RenobotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limit exceeded")]
    RateLimit { retry_after: Option<u64> },

    #[error("Upstream error: {message}")]
    Upstream { message: String, retryable: bool },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Profile lookup failed: {0}")]
    Profile(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using RenobotError.
pub type RenobotResult<T> = std::result::Result<T, RenobotError>;

impl RenobotError {
    /// Whether this error is retryable (rate limits, transient upstream errors).
    pub fn is_retryable(&self) -> bool {
        match self {
            RenobotError::RateLimit { .. } => true,
            RenobotError::Upstream { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

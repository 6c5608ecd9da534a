//! Error taxonomy for the observation pipeline.

/// Errors surfaced by the pipeline and its feed collaborators.
///
/// Fetch and parse failures are contained inside a poll cycle; only
/// lifecycle misuse reaches the caller of [`crate::poller::PollScheduler`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Feed fetch failed: {0}")]
    Fetch(String),

    #[error("Feed parse failed: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Parse(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Run failed with status: {0}")]
    RunFailed(String),

    #[error("Run {run_id} did not finish within {waited_secs}s")]
    Timeout { run_id: String, waited_secs: u64 },
}

impl ApifyError {
    /// Network blips and 429/5xx answers are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ApifyError::Network(_) | ApifyError::Timeout { .. } => true,
            ApifyError::Api { status, .. } => *status == 429 || *status >= 500,
            ApifyError::Parse(_) | ApifyError::RunFailed(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApifyError {
    fn from(err: reqwest::Error) -> Self {
        ApifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApifyError {
    fn from(err: serde_json::Error) -> Self {
        ApifyError::Parse(err.to_string())
    }
}

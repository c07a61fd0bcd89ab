use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Model refused: {0}")]
    Refusal(String),

    #[error("Empty response from {0}")]
    EmptyResponse(&'static str),

    #[error("I/O error: {0}")]
    Io(String),
}

impl AiError {
    /// Whether a retry of the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Network(_) | AiError::EmptyResponse(_) | AiError::Parse(_) => true,
            AiError::Api { status, .. } => *status == 429 || *status >= 500,
            AiError::Config(_) | AiError::Refusal(_) | AiError::Io(_) => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for AiError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        AiError::Config(e.to_string())
    }
}

use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad input; failing again will not help.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Run {0} was cancelled")]
    Cancelled(uuid::Uuid),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the job queue should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Validation(_)
            | PipelineError::NotFound(_)
            | PipelineError::Cancelled(_) => false,
            PipelineError::Parse(_)
            | PipelineError::Llm(_)
            | PipelineError::Extraction(_)
            | PipelineError::Scraping(_)
            | PipelineError::Timeout(_)
            | PipelineError::Other(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_and_cancellation_are_final() {
        assert!(!PipelineError::Validation("no images".into()).is_retryable());
        assert!(!PipelineError::Cancelled(uuid::Uuid::new_v4()).is_retryable());
        assert!(!PipelineError::NotFound("profile".into()).is_retryable());
    }

    #[test]
    fn transport_failures_are_retried() {
        assert!(PipelineError::Llm("503".into()).is_retryable());
        assert!(PipelineError::Parse("eof".into()).is_retryable());
        assert!(PipelineError::Timeout(120).is_retryable());
        assert!(PipelineError::from(anyhow::anyhow!("pool closed")).is_retryable());
    }
}

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;

use crate::claude::Claude;
use crate::error::AiError;
use crate::openai::OpenAi;
use crate::traits::{JsonSchemaSpec, Message, StructuredCompletion};

/// Which provider serves structured completions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    OpenAi,
    Claude,
}

impl FromStr for BackendKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "claude" | "anthropic" => Ok(BackendKind::Claude),
            other => Err(AiError::Config(format!("unknown LLM backend: {other}"))),
        }
    }
}

/// A structured-completion backend chosen once at start-up.
#[derive(Clone)]
pub enum AiBackend {
    OpenAi(OpenAi),
    Claude(Claude),
}

impl AiBackend {
    pub fn new(
        kind: BackendKind,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        match kind {
            BackendKind::OpenAi => AiBackend::OpenAi(OpenAi::new(api_key, model).with_timeout(timeout)),
            BackendKind::Claude => AiBackend::Claude(Claude::new(api_key, model).with_timeout(timeout)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            AiBackend::OpenAi(_) => BackendKind::OpenAi,
            AiBackend::Claude(_) => BackendKind::Claude,
        }
    }
}

#[async_trait]
impl StructuredCompletion for AiBackend {
    async fn complete(
        &self,
        messages: &[Message],
        schema: &JsonSchemaSpec,
    ) -> Result<String, AiError> {
        match self {
            AiBackend::OpenAi(ai) => ai.complete(messages, schema).await,
            AiBackend::Claude(ai) => ai.complete(messages, schema).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AiBackend::OpenAi(ai) => StructuredCompletion::model(ai),
            AiBackend::Claude(ai) => StructuredCompletion::model(ai),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_config_values() {
        assert_eq!("openai".parse::<BackendKind>().unwrap(), BackendKind::OpenAi);
        assert_eq!("Claude".parse::<BackendKind>().unwrap(), BackendKind::Claude);
        assert!("gemini".parse::<BackendKind>().is_err());
    }

    #[test]
    fn backend_reports_model_and_kind() {
        let backend = AiBackend::new(BackendKind::Claude, "k", "claude-sonnet-4-20250514", Duration::from_secs(5));
        assert_eq!(backend.kind(), BackendKind::Claude);
        assert_eq!(backend.model(), "claude-sonnet-4-20250514");
    }
}

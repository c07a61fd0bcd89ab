mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AiError;
use crate::traits::{JsonSchemaSpec, Message, StructuredCompletion};

use client::{ClaudeClient, ANTHROPIC_API_URL};
use types::*;

const DEFAULT_MAX_TOKENS: u32 = 8192;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::Config("ANTHROPIC_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn client(&self) -> ClaudeClient<'_> {
        ClaudeClient::new(
            &self.api_key,
            &self.http,
            self.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL),
        )
    }

    pub(crate) fn build_request(&self, messages: &[Message], schema: &JsonSchemaSpec) -> ChatRequest {
        let (system, turns) = split_messages(messages);
        ChatRequest::new(&self.model)
            .system(system)
            .messages(turns)
            .max_tokens(DEFAULT_MAX_TOKENS)
            .temperature(0.0)
            .forced_tool(ToolDefinitionWire {
                name: schema.name.clone(),
                description: "Return the structured answer for the input.".to_string(),
                input_schema: schema.schema.clone(),
            })
    }
}

// =============================================================================
// StructuredCompletion Implementation
// =============================================================================

#[async_trait]
impl StructuredCompletion for Claude {
    /// Structured output through a forced tool call; the tool input is the answer.
    async fn complete(
        &self,
        messages: &[Message],
        schema: &JsonSchemaSpec,
    ) -> Result<String, AiError> {
        let request = self.build_request(messages, schema);
        let response = self.client().chat(&request).await?;

        if response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(AiError::Parse("response truncated at max tokens".to_string()));
        }

        match response.tool_input(&schema.name) {
            Some(input) => Ok(serde_json::to_string(input)?),
            None => match response.text() {
                Some(text) if !text.trim().is_empty() => Err(AiError::Refusal(text)),
                _ => Err(AiError::EmptyResponse("Claude")),
            },
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        assert_eq!(ai.model, "claude-sonnet-4-20250514");
        assert_eq!(ai.api_key, "sk-ant-test");
    }

    #[test]
    fn test_claude_with_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514")
            .with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn requests_force_the_schema_tool() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        let schema = JsonSchemaSpec::new("extraction", json!({"type": "object"}));
        let request = ai.build_request(
            &[Message::system("Extract products."), Message::user("Caption")],
            &schema,
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["system"], "Extract products.");
        assert_eq!(value["tool_choice"], json!({"type": "tool", "name": "extraction"}));
        assert_eq!(value["tools"][0]["input_schema"], json!({"type": "object"}));
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
    }
}

mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AiError;
use crate::schema::strict_schema;
use crate::traits::{EmbedAgent, JsonSchemaSpec, Message, StructuredCompletion};

use client::{OpenAiClient, OPENAI_API_URL};

const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 8192;

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    pub(crate) model: String,
    embedding_model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self, AiError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AiError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bound every request; multimodal extraction with several images can be slow.
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

    fn client(&self) -> OpenAiClient<'_> {
        OpenAiClient::new(
            &self.api_key,
            &self.http,
            self.base_url.as_deref().unwrap_or(OPENAI_API_URL),
        )
    }

    pub(crate) fn build_request(
        &self,
        messages: &[Message],
        schema: &JsonSchemaSpec,
    ) -> types::ChatRequest {
        types::ChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(types::WireMessage::from).collect(),
            temperature: types::supports_temperature(&self.model).then_some(0.0),
            max_completion_tokens: Some(DEFAULT_MAX_COMPLETION_TOKENS),
            response_format: Some(types::ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: types::JsonSchemaFormat {
                    name: schema.name.clone(),
                    strict: true,
                    schema: strict_schema(schema.schema.clone()),
                },
            }),
        }
    }
}

// =============================================================================
// StructuredCompletion Implementation
// =============================================================================

#[async_trait]
impl StructuredCompletion for OpenAi {
    async fn complete(
        &self,
        messages: &[Message],
        schema: &JsonSchemaSpec,
    ) -> Result<String, AiError> {
        let request = self.build_request(messages, schema);
        self.client().structured_output(&request).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// =============================================================================
// EmbedAgent Implementation
// =============================================================================

#[async_trait]
impl EmbedAgent for OpenAi {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>, AiError> {
        self.client()
            .embed(&self.embedding_model, serde_json::Value::String(text.into()))
            .await?
            .into_iter()
            .next()
            .ok_or(AiError::EmptyResponse("OpenAI embeddings"))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let input = serde_json::Value::Array(texts.into_iter().map(serde_json::Value::String).collect());
        self.client().embed(&self.embedding_model, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_new() {
        let ai = OpenAi::new("sk-test", "gpt-4o");
        assert_eq!(ai.model, "gpt-4o");
        assert_eq!(ai.api_key, "sk-test");
        assert_eq!(ai.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn test_openai_with_base_url() {
        let ai = OpenAi::new("sk-test", "gpt-4o").with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn requests_carry_a_strict_json_schema() {
        let ai = OpenAi::new("sk-test", "gpt-4o");
        let schema = JsonSchemaSpec::new(
            "classification",
            json!({"type": "object", "properties": {"group": {"type": "string", "enum": ["tech", "car"]}}}),
        );
        let request = ai.build_request(&[Message::user("hi")], &schema);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["strict"], true);
        assert_eq!(value["response_format"]["json_schema"]["name"], "classification");
        assert_eq!(
            value["response_format"]["json_schema"]["schema"]["additionalProperties"],
            false
        );
        assert_eq!(value["temperature"], json!(0.0));
    }
}

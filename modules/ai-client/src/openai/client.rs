use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::AiError;

pub(crate) const OPENAI_API_URL: &str = "https://api.openai.com/v1";

pub(crate) struct OpenAiClient<'a> {
    api_key: &'a str,
    http: &'a reqwest::Client,
    base_url: &'a str,
}

impl<'a> OpenAiClient<'a> {
    pub fn new(api_key: &'a str, http: &'a reqwest::Client, base_url: &'a str) -> Self {
        Self {
            api_key,
            http,
            base_url,
        }
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post<B: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, AiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AiError::Api { status, message });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn structured_output(&self, request: &ChatRequest) -> Result<String, AiError> {
        debug!(model = %request.model, messages = request.messages.len(), "OpenAI structured output request");

        let response: ChatResponse = self.post("/chat/completions", request).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(AiError::EmptyResponse("OpenAI"))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(AiError::Refusal(refusal));
        }
        if choice.finish_reason.as_deref() == Some("length") {
            return Err(AiError::Parse("response truncated at max tokens".to_string()));
        }

        choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::EmptyResponse("OpenAI"))
    }

    pub async fn embed(&self, model: &str, input: serde_json::Value) -> Result<Vec<Vec<f32>>, AiError> {
        let request = EmbeddingRequest {
            model: model.to_string(),
            input,
        };
        let response: EmbeddingResponse = self.post("/embeddings", &request).await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use ai_client::EmbedAgent;
use shopscout_core::EmbeddingService;

/// Dyn-compatible wrapper over the OpenAI embeddings endpoint.
pub struct OpenAiEmbedder {
    ai: Arc<ai_client::OpenAi>,
}

impl OpenAiEmbedder {
    pub fn new(ai: Arc<ai_client::OpenAi>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.ai.embed(text.to_string()).await?)
    }
}

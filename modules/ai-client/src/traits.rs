use std::path::Path;

use async_trait::async_trait;
use base64::Engine;

use crate::error::AiError;

// =============================================================================
// Message Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// An image attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Publicly reachable URL; the provider fetches it.
    Url(String),
    /// Inline image bytes, already base64 encoded.
    Base64 { media_type: String, data: String },
}

impl ImageInput {
    pub fn url(url: impl Into<String>) -> Self {
        ImageInput::Url(url.into())
    }

    pub fn from_bytes(bytes: &[u8], media_type: impl Into<String>) -> Self {
        ImageInput::Base64 {
            media_type: media_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Read a stored image from disk and inline it.
    pub async fn from_file(path: &Path) -> Result<Self, AiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AiError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_bytes(&bytes, media_type_for(path)))
    }

    /// Render as a URL usable by OpenAI-style `image_url` parts (data URL for inline bytes).
    pub fn as_url(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Base64 { media_type, data } => format!("data:{};base64,{}", media_type, data),
        }
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub images: Vec<ImageInput>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageInput>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            images,
        }
    }
}

/// A named JSON schema the response must conform to.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonSchemaSpec {
    pub name: String,
    pub schema: serde_json::Value,
}

impl JsonSchemaSpec {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

// =============================================================================
// StructuredCompletion Trait
// =============================================================================

/// One multimodal request whose answer is JSON text matching `schema`.
#[async_trait]
pub trait StructuredCompletion: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        schema: &JsonSchemaSpec,
    ) -> Result<String, AiError>;

    fn model(&self) -> &str;
}

// =============================================================================
// EmbedAgent Trait
// =============================================================================

#[async_trait]
pub trait EmbedAgent: Send + Sync {
    async fn embed(&self, text: impl Into<String> + Send) -> Result<Vec<f32>, AiError>;
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AiError>;
}

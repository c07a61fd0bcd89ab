use serde::{Deserialize, Serialize};

use crate::traits::{ImageInput, Message, MessageRole};

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Blocks(Vec<RequestBlock>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub(crate) enum RequestBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ImageSource {
    #[serde(rename = "base64")]
    Base64 { media_type: String, data: String },
    #[serde(rename = "url")]
    Url { url: String },
}

impl From<&ImageInput> for ImageSource {
    fn from(image: &ImageInput) -> Self {
        match image {
            ImageInput::Url(url) => ImageSource::Url { url: url.clone() },
            ImageInput::Base64 { media_type, data } => ImageSource::Base64 {
                media_type: media_type.clone(),
                data: data.clone(),
            },
        }
    }
}

/// Claude takes the system prompt out of band; everything else maps onto a turn.
pub(crate) fn split_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system: Vec<&str> = Vec::new();
    let mut wire = Vec::with_capacity(messages.len());

    for message in messages {
        let role = match message.role {
            MessageRole::System => {
                system.push(&message.content);
                continue;
            }
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        };

        let content = if message.images.is_empty() {
            MessageContent::Text(message.content.clone())
        } else {
            // Images first, then the text that refers to them.
            let mut blocks: Vec<RequestBlock> = message
                .images
                .iter()
                .map(|image| RequestBlock::Image {
                    source: image.into(),
                })
                .collect();
            if !message.content.is_empty() {
                blocks.push(RequestBlock::Text {
                    text: message.content.clone(),
                });
            }
            MessageContent::Blocks(blocks)
        };
        wire.push(WireMessage { role, content });
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, wire)
}

// =============================================================================
// Tool Definition
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolDefinitionWire {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

// =============================================================================
// Chat Request
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinitionWire>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4096,
            messages: Vec::new(),
            system: None,
            temperature: None,
            tools: None,
            tool_choice: None,
        }
    }

    pub fn system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = WireMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Offer exactly one tool and force the model to call it.
    pub fn forced_tool(mut self, tool: ToolDefinitionWire) -> Self {
        self.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool.name,
        }));
        self.tools = Some(vec![tool]);
        self
    }
}

// =============================================================================
// Chat Response
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        #[allow(dead_code)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    pub content: Vec<ResponseBlock>,
    pub stop_reason: Option<String>,
}

impl ChatResponse {
    pub fn tool_input(&self, tool_name: &str) -> Option<&serde_json::Value> {
        self.content.iter().find_map(|block| match block {
            ResponseBlock::ToolUse { name, input, .. } if name == tool_name => Some(input),
            _ => None,
        })
    }

    pub fn text(&self) -> Option<String> {
        self.content.iter().find_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.clone()),
            _ => None,
        })
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use conduit_core::Usage;

use super::MessageContent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    /// Sampling parameters and the like; accepted and ignored.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatCompletionRequest {
    pub fn include_usage(&self) -> bool {
        self.stream_options
            .as_ref()
            .map(|options| options.include_usage)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// `null` for assistant turns that only carry tool calls
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
        }
    }

    pub fn text(&self) -> String {
        self.content
            .as_ref()
            .map(MessageContent::text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: OpenAiUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<OpenAiUsage>,
}

impl ChatCompletionChunk {
    pub fn new(id: &str, created: i64, model: &str, choice: ChunkChoice) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![choice],
            usage: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Serialized as `null` until the final chunk
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<&Usage> for OpenAiUsage {
    fn from(usage: &Usage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

impl ModelList {
    pub fn new<I, S>(ids: I, created: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            object: "list".to_string(),
            data: ids
                .into_iter()
                .map(|id| ModelInfo {
                    id: id.into(),
                    object: "model".to_string(),
                    created,
                    owned_by: "anthropic".to_string(),
                })
                .collect(),
        }
    }
}

/// `{"error": {"message": ..., "type": ...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.into(),
                code: None,
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let request: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": [{"type": "text", "text": "Hi"}]},
                {"role": "assistant", "content": null}
            ],
            "stream": true,
            "stream_options": {"include_usage": true},
            "temperature": 0.2
        }))
        .unwrap();

        assert_eq!(request.model.as_deref(), Some("claude-sonnet-4-5"));
        assert!(request.stream);
        assert!(request.include_usage());
        assert_eq!(request.messages[1].text(), "Hi");
        assert_eq!(request.messages[2].text(), "");
        assert_eq!(request.extra["temperature"], json!(0.2));
    }

    #[test]
    fn test_minimal_request_defaults() {
        let request: ChatCompletionRequest =
            serde_json::from_str(r#"{"messages":[{"role":"user","content":"x"}]}"#).unwrap();
        assert!(request.model.is_none());
        assert!(!request.stream);
        assert!(!request.include_usage());
    }

    #[test]
    fn test_chunk_serializes_null_finish_reason() {
        let chunk = ChatCompletionChunk::new(
            "chatcmpl-1",
            1,
            "m",
            ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: None,
                    content: Some("A".to_string()),
                },
                finish_reason: None,
            },
        );
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["object"], "chat.completion.chunk");
        assert_eq!(value["choices"][0]["finish_reason"], Value::Null);
        assert_eq!(value["choices"][0]["delta"], json!({"content": "A"}));
        assert!(value.get("usage").is_none());
    }

    #[test]
    fn test_usage_conversion() {
        let usage = OpenAiUsage::from(&Usage::new(10, 5));
        assert_eq!(
            usage,
            OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15
            }
        );
    }

    #[test]
    fn test_model_list() {
        let list = ModelList::new(["a", "b"], 0);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value["object"], "list");
        assert_eq!(value["data"][1]["id"], "b");
        assert_eq!(value["data"][1]["object"], "model");
    }
}

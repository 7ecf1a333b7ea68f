//! Backend event envelopes
//!
//! The backend writes one JSON object per line on stdout. Every line is a
//! [`BackendEvent`]; fine-grained streaming increments arrive wrapped in
//! [`BackendEvent::StreamEvent`] as a [`StreamSubEvent`].

pub mod envelope;

pub use envelope::UserEnvelope;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BlockDelta, ContentBlock, Usage};

/// One line of backend output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    System(SystemEvent),
    User(UserEvent),
    Assistant(AssistantEvent),
    StreamEvent(StreamEnvelope),
    Result(ResultEvent),
    /// A `type` this gateway does not know about
    #[serde(other)]
    Unknown,
}

impl BackendEvent {
    /// Parse a single stdout line
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::StreamEvent(_) => "stream_event",
            Self::Result(_) => "result",
            Self::Unknown => "unknown",
        }
    }

    /// `result` marks the end of a request
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// The wrapped sub-event, if this is a `stream_event`
    pub fn sub_event(&self) -> Option<&StreamSubEvent> {
        match self {
            Self::StreamEvent(envelope) => Some(&envelope.event),
            _ => None,
        }
    }

    /// Create a stream event (mostly useful in tests)
    pub fn stream(event: StreamSubEvent) -> Self {
        Self::StreamEvent(StreamEnvelope {
            event,
            session_id: None,
        })
    }

    /// Create an assistant event with a single text block
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantEvent {
            message: AssistantMessage {
                content: vec![ContentBlock::text(text)],
                ..AssistantMessage::default()
            },
            session_id: None,
        })
    }

    /// Create a successful result event
    pub fn result(usage: Option<Usage>) -> Self {
        Self::Result(ResultEvent {
            subtype: Some("success".to_string()),
            usage,
            ..ResultEvent::default()
        })
    }
}

/// `system` line, usually the init banner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// `user` line; the backend echoes tool results this way
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEvent {
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `assistant` line carrying the complete message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantEvent {
    pub message: AssistantMessage,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl AssistantMessage {
    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content.iter().filter_map(|b| b.as_text()).collect()
    }
}

/// `stream_event` wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEnvelope {
    pub event: StreamSubEvent,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `result` line: terminal for the current request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEvent {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// Fine-grained increment of an in-progress response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamSubEvent {
    MessageStart {
        #[serde(default)]
        message: MessageStartBody,
    },
    ContentBlockStart {
        #[serde(default)]
        index: u32,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: u32,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<Usage>,
    },
    MessageStop,
    Ping,
    #[serde(other)]
    Unknown,
}

impl StreamSubEvent {
    /// Text fragment for `content_block_delta` text deltas
    pub fn text_delta(&self) -> Option<&str> {
        match self {
            Self::ContentBlockDelta { delta, .. } => delta.as_text(),
            _ => None,
        }
    }

    /// Usage carried by `message_start` or `message_delta`
    pub fn usage(&self) -> Option<&Usage> {
        match self {
            Self::MessageStart { message } => message.usage.as_ref(),
            Self::MessageDelta { usage, .. } => usage.as_ref(),
            _ => None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::TextDelta { text: text.into() },
        }
    }
}

/// Body of `message_start.message`; only the fields the gateway reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStartBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

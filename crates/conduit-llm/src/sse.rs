use serde::Serialize;

/// A single server-sent event, before transport encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<&'static str>,
    pub data: String,
}

impl SseFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: &'static str, data: impl Into<String>) -> Self {
        Self {
            event: Some(event),
            data: data.into(),
        }
    }

    /// OpenAI stream terminator
    pub fn done() -> Self {
        Self::data("[DONE]")
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        Self::data(to_json(value))
    }

    pub fn named_json<T: Serialize>(event: &'static str, value: &T) -> Self {
        Self::named(event, to_json(value))
    }

    pub fn is_done(&self) -> bool {
        self.event.is_none() && self.data == "[DONE]"
    }

    /// Parse the data payload back into JSON. `None` for `[DONE]`.
    pub fn json_value(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.data).ok()
    }

    /// Wire form: `event: <name>\ndata: <payload>\n\n`, or just the data line.
    pub fn encode(&self) -> String {
        match self.event {
            Some(event) => format!("event: {}\ndata: {}\n\n", event, self.data),
            None => format!("data: {}\n\n", self.data),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize SSE payload: {}", e);
            "{}".to_string()
        }
    }
}

use serde::{Deserialize, Serialize};

/// Why the backend stopped generating, in Anthropic vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    /// Passed through verbatim to Anthropic clients
    Other(String),
}

impl Default for StopReason {
    fn default() -> Self {
        Self::EndTurn
    }
}

impl StopReason {
    /// Parse a wire value; an absent reason means the turn ended normally.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            None => Self::EndTurn,
            Some(s) => Self::from(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EndTurn => "end_turn",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::ToolUse => "tool_use",
            Self::Other(s) => s,
        }
    }

    /// OpenAI `finish_reason` for this stop reason
    pub fn finish_reason(&self) -> FinishReason {
        match self {
            Self::MaxTokens => FinishReason::Length,
            Self::ToolUse => FinishReason::ToolCalls,
            Self::EndTurn | Self::StopSequence | Self::Other(_) => FinishReason::Stop,
        }
    }
}

impl From<String> for StopReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "end_turn" => Self::EndTurn,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "tool_use" => Self::ToolUse,
            _ => Self::Other(s),
        }
    }
}

impl From<StopReason> for String {
    fn from(reason: StopReason) -> Self {
        reason.as_str().to_string()
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// OpenAI `finish_reason`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool_calls",
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Total mapping from a backend stop reason to an OpenAI finish reason.
pub fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    StopReason::from_wire(reason).finish_reason()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping_is_total() {
        assert_eq!(map_finish_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("max_tokens")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("tool_use")), FinishReason::ToolCalls);
        assert_eq!(map_finish_reason(Some("stop_sequence")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("refusal")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("")), FinishReason::Stop);
        assert_eq!(map_finish_reason(None), FinishReason::Stop);
    }

    #[test]
    fn test_stop_reason_serde() {
        let reason: StopReason = serde_json::from_str(r#""max_tokens""#).unwrap();
        assert_eq!(reason, StopReason::MaxTokens);
        assert_eq!(serde_json::to_string(&StopReason::ToolUse).unwrap(), r#""tool_use""#);
        assert_eq!(
            serde_json::to_string(&StopReason::Other("pause_turn".into())).unwrap(),
            r#""pause_turn""#
        );
    }
}

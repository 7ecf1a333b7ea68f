//! Collapse a completed request's events into one response object.

use conduit_core::{ids, BackendEvent, ContentBlock, StopReason, StreamSubEvent, Usage};

use crate::adapters::anthropic::MessagesResponse;
use crate::adapters::openai::{ChatCompletion, Choice, OpenAiUsage, ResponseMessage};

/// Accumulates text, usage and stop reason over a request's events.
///
/// Text comes from full assistant messages when the backend sent any, since
/// those repeat what the deltas already carried; otherwise from the text
/// deltas; otherwise from the `result` summary.
#[derive(Debug, Clone, Default)]
pub struct ResponseAggregator {
    assistant_text: Option<String>,
    delta_text: String,
    result_text: Option<String>,
    usage: Option<Usage>,
    stop_reason: Option<String>,
    stop_sequence: Option<String>,
    assistant_stop_reason: Option<String>,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a BackendEvent>) -> Self {
        let mut aggregator = Self::new();
        for event in events {
            aggregator.push(event);
        }
        aggregator
    }

    pub fn push(&mut self, event: &BackendEvent) {
        match event {
            BackendEvent::Assistant(assistant) => {
                self.assistant_text
                    .get_or_insert_with(String::new)
                    .push_str(&assistant.message.text());
                if assistant.message.stop_reason.is_some() {
                    self.assistant_stop_reason = assistant.message.stop_reason.clone();
                }
            }
            BackendEvent::StreamEvent(envelope) => match &envelope.event {
                StreamSubEvent::MessageStart { message } => {
                    if message.usage.is_some() {
                        self.usage = message.usage;
                    }
                }
                StreamSubEvent::ContentBlockDelta { delta, .. } => {
                    if let Some(text) = delta.as_text() {
                        self.delta_text.push_str(text);
                    }
                }
                StreamSubEvent::MessageDelta { delta, usage } => {
                    if let Some(usage) = usage {
                        self.usage
                            .get_or_insert_with(Usage::default)
                            .merge_delta(usage);
                    }
                    if delta.stop_reason.is_some() {
                        self.stop_reason = delta.stop_reason.clone();
                        self.stop_sequence = delta.stop_sequence.clone();
                    }
                }
                _ => {}
            },
            BackendEvent::Result(result) => {
                if result.usage.is_some() {
                    self.usage = result.usage;
                }
                if result.result.is_some() {
                    self.result_text = result.result.clone();
                }
            }
            _ => {}
        }
    }

    pub fn text(&self) -> &str {
        if let Some(text) = &self.assistant_text {
            return text;
        }
        if !self.delta_text.is_empty() {
            return &self.delta_text;
        }
        self.result_text.as_deref().unwrap_or_default()
    }

    pub fn usage(&self) -> Usage {
        self.usage.unwrap_or_default()
    }

    /// Last `message_delta` stop reason, `end_turn` when none was seen
    pub fn stop_reason(&self) -> StopReason {
        let reason = self
            .stop_reason
            .as_deref()
            .or(self.assistant_stop_reason.as_deref());
        StopReason::from_wire(reason)
    }

    pub fn into_chat_completion(self, model: &str) -> ChatCompletion {
        ChatCompletion {
            id: ids::new_completion_id(),
            object: "chat.completion".to_string(),
            created: ids::unix_timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: self.text().to_string(),
                },
                finish_reason: self.stop_reason().finish_reason().as_str().to_string(),
            }],
            usage: OpenAiUsage::from(&self.usage()),
        }
    }

    pub fn into_message(self, model: &str) -> MessagesResponse {
        MessagesResponse {
            id: ids::new_message_id(),
            response_type: "message".to_string(),
            role: "assistant".to_string(),
            content: vec![ContentBlock::text(self.text())],
            model: model.to_string(),
            stop_reason: Some(self.stop_reason().as_str().to_string()),
            stop_sequence: self.stop_sequence.clone(),
            usage: self.usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{MessageDeltaBody, MessageStartBody, ResultEvent};

    fn delta(stop_reason: &str, output_tokens: u64) -> BackendEvent {
        BackendEvent::stream(StreamSubEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(stop_reason.to_string()),
                stop_sequence: None,
            },
            usage: Some(Usage::new(0, output_tokens)),
        })
    }

    #[test]
    fn test_assistant_and_result() {
        let events = vec![
            BackendEvent::assistant_text("Hi!"),
            BackendEvent::result(Some(Usage::new(3, 2))),
        ];
        let message = ResponseAggregator::from_events(&events).into_message("claude-sonnet-4-5");

        assert_eq!(message.content, vec![ContentBlock::text("Hi!")]);
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(message.usage, Usage::new(3, 2));
        assert_eq!(message.model, "claude-sonnet-4-5");
        assert!(message.id.starts_with("msg_"));
    }

    #[test]
    fn test_usage_is_interleaving_independent() {
        let events = vec![
            BackendEvent::stream(StreamSubEvent::MessageStart {
                message: MessageStartBody {
                    usage: Some(Usage::new(10, 1)),
                    ..MessageStartBody::default()
                },
            }),
            BackendEvent::stream(StreamSubEvent::text("a")),
            delta("end_turn", 3),
            BackendEvent::result(Some(Usage::new(10, 5))),
        ];
        let completion = ResponseAggregator::from_events(&events).into_chat_completion("m");
        assert_eq!(
            completion.usage,
            OpenAiUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15
            }
        );

        let reordered = vec![BackendEvent::result(Some(Usage::new(10, 5)))];
        let completion = ResponseAggregator::from_events(&reordered).into_chat_completion("m");
        assert_eq!(completion.usage.total_tokens, 15);
    }

    #[test]
    fn test_assistant_text_wins_over_deltas() {
        let events = vec![
            BackendEvent::stream(StreamSubEvent::text("Hel")),
            BackendEvent::stream(StreamSubEvent::text("lo")),
            BackendEvent::assistant_text("Hello"),
        ];
        assert_eq!(ResponseAggregator::from_events(&events).text(), "Hello");

        let deltas_only = &events[..2];
        assert_eq!(ResponseAggregator::from_events(deltas_only).text(), "Hello");
    }

    #[test]
    fn test_result_text_is_last_resort() {
        let events = vec![BackendEvent::Result(ResultEvent {
            result: Some("from summary".to_string()),
            ..ResultEvent::default()
        })];
        let aggregator = ResponseAggregator::from_events(&events);
        assert_eq!(aggregator.text(), "from summary");
        assert_eq!(aggregator.usage(), Usage::default());
    }

    #[test]
    fn test_stop_reason_mapping() {
        let events = vec![BackendEvent::assistant_text("x"), delta("max_tokens", 1)];
        let aggregator = ResponseAggregator::from_events(&events);
        assert_eq!(aggregator.stop_reason(), StopReason::MaxTokens);

        let completion = aggregator.clone().into_chat_completion("m");
        assert_eq!(completion.choices[0].finish_reason, "length");
        assert_eq!(completion.object, "chat.completion");

        let message = aggregator.into_message("m");
        assert_eq!(message.stop_reason.as_deref(), Some("max_tokens"));
    }

    #[test]
    fn test_unknown_stop_reason_passes_through_for_messages() {
        let events = vec![delta("refusal", 0)];
        let aggregator = ResponseAggregator::from_events(&events);
        assert_eq!(aggregator.clone().into_message("m").stop_reason.as_deref(), Some("refusal"));
        assert_eq!(aggregator.into_chat_completion("m").choices[0].finish_reason, "stop");
    }

    #[test]
    fn test_empty_events() {
        let message = ResponseAggregator::new().into_message("m");
        assert_eq!(message.content, vec![ContentBlock::text("")]);
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(message.usage, Usage::default());
    }
}

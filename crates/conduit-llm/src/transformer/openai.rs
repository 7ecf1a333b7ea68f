use conduit_core::{ids, map_finish_reason, BackendEvent, StreamSubEvent, Usage};

use super::{is_intermediate_stop, ControlGate, StreamTranslator};
use crate::adapters::openai::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ErrorResponse, OpenAiUsage,
};
use crate::sse::SseFrame;

/// Backend events → `chat.completion.chunk` frames terminated by `[DONE]`
#[derive(Debug)]
pub struct OpenAiStreamTranslator {
    id: String,
    model: String,
    created: i64,
    include_usage: bool,
    role: ControlGate,
    usage: Usage,
    stop_reason: Option<String>,
    finished: bool,
}

impl OpenAiStreamTranslator {
    pub fn new(model: impl Into<String>, include_usage: bool) -> Self {
        Self {
            id: ids::new_completion_id(),
            model: model.into(),
            created: ids::unix_timestamp(),
            include_usage,
            role: ControlGate::default(),
            usage: Usage::default(),
            stop_reason: None,
            finished: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk::new(
            &self.id,
            self.created,
            &self.model,
            ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            },
        )
    }

    fn open_role(&mut self, frames: &mut Vec<SseFrame>) {
        if self.role.open().is_opened() {
            let delta = ChunkDelta {
                role: Some("assistant".to_string()),
                content: Some(String::new()),
            };
            frames.push(SseFrame::json(&self.chunk(delta, None)));
        }
    }

    fn close(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.open_role(&mut frames);

        let finish_reason = map_finish_reason(self.stop_reason.as_deref());
        let mut last = self.chunk(
            ChunkDelta::default(),
            Some(finish_reason.as_str().to_string()),
        );
        if self.include_usage {
            last.usage = Some(OpenAiUsage::from(&self.usage));
        }
        frames.push(SseFrame::json(&last));
        frames.push(SseFrame::done());

        self.finished = true;
        frames
    }
}

impl StreamTranslator for OpenAiStreamTranslator {
    fn on_event(&mut self, event: &BackendEvent) -> Vec<SseFrame> {
        if self.finished {
            return Vec::new();
        }

        if let BackendEvent::Result(result) = event {
            if let Some(usage) = result.usage {
                self.usage = usage;
            }
            return Vec::new();
        }

        let Some(sub_event) = event.sub_event() else {
            return Vec::new();
        };

        let mut frames = Vec::new();
        match sub_event {
            StreamSubEvent::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.usage = usage;
                }
                self.open_role(&mut frames);
            }
            StreamSubEvent::ContentBlockDelta { delta, .. } => {
                if let Some(text) = delta.as_text() {
                    self.open_role(&mut frames);
                    let delta = ChunkDelta {
                        role: None,
                        content: Some(text.to_string()),
                    };
                    frames.push(SseFrame::json(&self.chunk(delta, None)));
                }
            }
            StreamSubEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.usage.merge_delta(usage);
                }
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason.clone();
                }
            }
            StreamSubEvent::MessageStop => {
                if !is_intermediate_stop(self.stop_reason.as_deref()) {
                    return self.close();
                }
            }
            _ => {}
        }
        frames
    }

    fn on_error(&mut self, message: &str) -> Vec<SseFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![
            SseFrame::json(&ErrorResponse::new("backend_error", message)),
            SseFrame::done(),
        ]
    }

    fn finish(&mut self) -> Vec<SseFrame> {
        if self.finished {
            return Vec::new();
        }
        self.close()
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::{MessageDeltaBody, MessageStartBody};
    use serde_json::Value;

    fn stream(event: StreamSubEvent) -> BackendEvent {
        BackendEvent::stream(event)
    }

    fn message_start(usage: Option<Usage>) -> BackendEvent {
        stream(StreamSubEvent::MessageStart {
            message: MessageStartBody {
                usage,
                ..MessageStartBody::default()
            },
        })
    }

    fn message_delta(stop_reason: &str, output_tokens: u64) -> BackendEvent {
        stream(StreamSubEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(stop_reason.to_string()),
                stop_sequence: None,
            },
            usage: Some(Usage::new(0, output_tokens)),
        })
    }

    fn run(translator: &mut OpenAiStreamTranslator, events: &[BackendEvent]) -> Vec<SseFrame> {
        events
            .iter()
            .flat_map(|event| translator.on_event(event))
            .collect()
    }

    #[test]
    fn test_role_then_deltas_then_final() {
        let mut translator = OpenAiStreamTranslator::new("claude-sonnet-4-5", false);
        let frames = run(
            &mut translator,
            &[
                message_start(Some(Usage::new(4, 1))),
                stream(StreamSubEvent::text("A")),
                stream(StreamSubEvent::text("B")),
                message_delta("end_turn", 2),
                stream(StreamSubEvent::MessageStop),
            ],
        );

        assert_eq!(frames.len(), 5);
        let chunks: Vec<Value> = frames[..4].iter().map(|f| f.json_value().unwrap()).collect();
        assert_eq!(chunks[0]["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "");
        assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "A");
        assert_eq!(chunks[2]["choices"][0]["delta"]["content"], "B");
        assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
        assert!(chunks[3].get("usage").is_none());
        assert!(frames[4].is_done());

        for chunk in &chunks {
            assert_eq!(chunk["id"], translator.id());
            assert_eq!(chunk["model"], "claude-sonnet-4-5");
        }
        assert!(translator.is_finished());
    }

    #[test]
    fn test_duplicate_message_start_emits_one_role_chunk() {
        let mut translator = OpenAiStreamTranslator::new("m", false);
        let frames = run(
            &mut translator,
            &[message_start(None), message_start(None), stream(StreamSubEvent::text("x"))],
        );
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_usage_attached_when_requested() {
        let mut translator = OpenAiStreamTranslator::new("m", true);
        let frames = run(
            &mut translator,
            &[
                message_start(Some(Usage::new(10, 1))),
                message_delta("max_tokens", 5),
                stream(StreamSubEvent::MessageStop),
            ],
        );
        let last = frames[frames.len() - 2].json_value().unwrap();
        assert_eq!(last["choices"][0]["finish_reason"], "length");
        assert_eq!(last["usage"]["prompt_tokens"], 10);
        assert_eq!(last["usage"]["completion_tokens"], 5);
        assert_eq!(last["usage"]["total_tokens"], 15);
    }

    #[test]
    fn test_non_text_deltas_are_skipped() {
        let mut translator = OpenAiStreamTranslator::new("m", false);
        let frames = run(
            &mut translator,
            &[stream(StreamSubEvent::ContentBlockDelta {
                index: 1,
                delta: conduit_core::BlockDelta::InputJsonDelta {
                    partial_json: "{".to_string(),
                },
            })],
        );
        assert!(frames.is_empty());
    }

    #[test]
    fn test_tool_use_turn_does_not_end_stream() {
        let mut translator = OpenAiStreamTranslator::new("m", false);
        let frames = run(
            &mut translator,
            &[
                message_start(None),
                message_delta("tool_use", 3),
                stream(StreamSubEvent::MessageStop),
                message_start(None),
                stream(StreamSubEvent::text("done")),
                message_delta("end_turn", 4),
                stream(StreamSubEvent::MessageStop),
            ],
        );
        assert!(translator.is_finished());
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[2].json_value().unwrap()["choices"][0]["finish_reason"], "stop");
    }

    #[test]
    fn test_finish_synthesizes_ending_once() {
        let mut translator = OpenAiStreamTranslator::new("m", false);
        translator.on_event(&stream(StreamSubEvent::text("partial")));

        let frames = translator.finish();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_done());
        assert!(translator.finish().is_empty());
        assert!(translator.on_error("late").is_empty());
    }

    #[test]
    fn test_error_frame_then_done() {
        let mut translator = OpenAiStreamTranslator::new("m", false);
        translator.on_event(&stream(StreamSubEvent::text("A")));

        let frames = translator.on_error("backend process exited with code 1");
        assert_eq!(frames.len(), 2);
        let error = frames[0].json_value().unwrap();
        assert_eq!(error["error"]["message"], "backend process exited with code 1");
        assert!(frames[1].is_done());
        assert!(translator.on_event(&stream(StreamSubEvent::text("B"))).is_empty());
    }
}

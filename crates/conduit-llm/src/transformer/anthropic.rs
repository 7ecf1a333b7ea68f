use conduit_core::{ids, BackendEvent, ContentBlock, StopReason, StreamSubEvent, Usage};

use super::{is_intermediate_stop, ControlGate, StreamTranslator};
use crate::adapters::anthropic::{DeltaUsage, MessageDelta, MessagesStreamEvent, StreamMessage};
use crate::sse::SseFrame;

/// Replays backend stream events as Anthropic Messages SSE under the
/// gateway's own message id and model.
///
/// Only text blocks reach the client, matching the non-streaming reply. The
/// backend runs its own tools, so its `tool_use` and `thinking` blocks stay
/// internal. Block indices are renumbered and advance only when a forwarded
/// block is closed.
#[derive(Debug)]
pub struct AnthropicStreamTranslator {
    id: String,
    model: String,
    message: ControlGate,
    block: ControlGate,
    block_index: u32,
    /// Inside a backend block that is not forwarded
    skipping_block: bool,
    usage: Usage,
    stop_reason: Option<String>,
    stop_sequence: Option<String>,
    delta_sent: bool,
    finished: bool,
}

impl AnthropicStreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: ids::new_message_id(),
            model: model.into(),
            message: ControlGate::default(),
            block: ControlGate::default(),
            block_index: 0,
            skipping_block: false,
            usage: Usage::default(),
            stop_reason: None,
            stop_sequence: None,
            delta_sent: false,
            finished: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn open_message(&mut self, frames: &mut Vec<SseFrame>) {
        if self.message.open().is_opened() {
            let event = MessagesStreamEvent::MessageStart {
                message: StreamMessage::new(&self.id, &self.model, self.usage),
            };
            frames.push(event.to_frame());
        }
    }

    fn open_block(&mut self, content_block: ContentBlock, frames: &mut Vec<SseFrame>) {
        if self.block.open().is_opened() {
            let event = MessagesStreamEvent::ContentBlockStart {
                index: self.block_index,
                content_block,
            };
            frames.push(event.to_frame());
        }
    }

    fn close_block(&mut self, frames: &mut Vec<SseFrame>) {
        if self.block.close() {
            let event = MessagesStreamEvent::ContentBlockStop {
                index: self.block_index,
            };
            frames.push(event.to_frame());
            self.block_index += 1;
        }
    }

    fn message_delta(&mut self) -> SseFrame {
        self.delta_sent = true;
        let stop_reason = StopReason::from_wire(self.stop_reason.as_deref());
        MessagesStreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: stop_reason.as_str().to_string(),
                stop_sequence: self.stop_sequence.clone(),
            },
            usage: DeltaUsage {
                output_tokens: self.usage.output_tokens,
            },
        }
        .to_frame()
    }

    fn close(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.open_message(&mut frames);
        self.close_block(&mut frames);
        if !self.delta_sent {
            frames.push(self.message_delta());
        }
        frames.push(MessagesStreamEvent::MessageStop.to_frame());
        self.finished = true;
        frames
    }
}

impl StreamTranslator for AnthropicStreamTranslator {
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
                if !self.message.is_started() {
                    if let Some(usage) = message.usage {
                        self.usage = usage;
                    }
                }
                self.open_message(&mut frames);
            }
            StreamSubEvent::ContentBlockStart { content_block, .. } => {
                if content_block.as_text().is_none() {
                    self.skipping_block = true;
                    return frames;
                }
                self.open_message(&mut frames);
                self.open_block(content_block.clone(), &mut frames);
            }
            StreamSubEvent::ContentBlockDelta { delta, .. } => {
                if self.skipping_block || delta.as_text().is_none() {
                    return frames;
                }
                self.open_message(&mut frames);
                self.open_block(ContentBlock::text(""), &mut frames);
                let event = MessagesStreamEvent::ContentBlockDelta {
                    index: self.block_index,
                    delta: delta.clone(),
                };
                frames.push(event.to_frame());
            }
            StreamSubEvent::ContentBlockStop { .. } => {
                if self.skipping_block {
                    self.skipping_block = false;
                } else {
                    self.close_block(&mut frames);
                }
            }
            StreamSubEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.usage.merge_delta(usage);
                }
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason.clone();
                    self.stop_sequence = delta.stop_sequence.clone();
                }
                self.open_message(&mut frames);
                self.close_block(&mut frames);
                if !is_intermediate_stop(self.stop_reason.as_deref()) {
                    frames.push(self.message_delta());
                }
            }
            StreamSubEvent::MessageStop => {
                if !is_intermediate_stop(self.stop_reason.as_deref()) {
                    return self.close();
                }
            }
            StreamSubEvent::Ping | StreamSubEvent::Unknown => {}
        }
        frames
    }

    fn on_error(&mut self, message: &str) -> Vec<SseFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![MessagesStreamEvent::api_error(message).to_frame()]
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

//! Backend event stream → downstream SSE frames

pub mod anthropic;
pub mod gate;
pub mod openai;

pub use anthropic::AnthropicStreamTranslator;
pub use gate::{ControlGate, GateOutcome};
pub use openai::OpenAiStreamTranslator;

use conduit_backend::Delivery;
use conduit_core::BackendEvent;
use futures::{Stream, StreamExt};

use crate::sse::SseFrame;

/// Stateful translator for one streaming response.
///
/// Every method returns the frames to write, possibly none. Once finished,
/// all methods return nothing.
pub trait StreamTranslator: Send {
    fn on_event(&mut self, event: &BackendEvent) -> Vec<SseFrame>;

    /// Terminal frames for a failed request.
    fn on_error(&mut self, message: &str) -> Vec<SseFrame>;

    /// Close the response after the backend completed, synthesizing
    /// whatever closing events the backend did not send.
    fn finish(&mut self) -> Vec<SseFrame>;

    fn is_finished(&self) -> bool;
}

/// A `tool_use` stop ends one backend turn, not the reply: the backend runs
/// the tool itself and continues with another message.
pub(crate) fn is_intermediate_stop(stop_reason: Option<&str>) -> bool {
    stop_reason == Some("tool_use")
}

/// Drive `translator` over a request's deliveries until it is finished.
pub fn translate<S, T>(deliveries: S, mut translator: T) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Delivery> + Send + Unpin,
    T: StreamTranslator,
{
    async_stream::stream! {
        let mut deliveries = deliveries;
        while let Some(delivery) = deliveries.next().await {
            let frames = match delivery {
                Delivery::Event(event) => translator.on_event(&event),
                Delivery::Done { .. } => translator.finish(),
                Delivery::Failed(e) => {
                    tracing::warn!("Backend request failed mid-stream: {}", e);
                    translator.on_error(&e.to_string())
                }
            };
            for frame in frames {
                yield frame;
            }
            if translator.is_finished() {
                break;
            }
        }

        if !translator.is_finished() {
            for frame in translator.on_error("backend closed the request without completing it") {
                yield frame;
            }
        }
    }
}

//! Delivery stream → SSE frames, end to end.

use conduit_backend::{BackendError, Delivery};
use conduit_core::{BackendEvent, MessageDeltaBody, MessageStartBody, StreamSubEvent, Usage};
use conduit_llm::{translate, AnthropicStreamTranslator, OpenAiStreamTranslator, SseFrame};
use futures::{stream, StreamExt};

fn event(sub_event: StreamSubEvent) -> Delivery {
    Delivery::Event(BackendEvent::stream(sub_event))
}

fn message_start() -> Delivery {
    event(StreamSubEvent::MessageStart {
        message: MessageStartBody {
            usage: Some(Usage::new(3, 1)),
            ..MessageStartBody::default()
        },
    })
}

fn end_turn() -> Delivery {
    event(StreamSubEvent::MessageDelta {
        delta: MessageDeltaBody {
            stop_reason: Some("end_turn".to_string()),
            stop_sequence: None,
        },
        usage: Some(Usage::new(0, 2)),
    })
}

async fn run<T>(deliveries: Vec<Delivery>, translator: T) -> Vec<SseFrame>
where
    T: conduit_llm::StreamTranslator,
{
    translate(stream::iter(deliveries), translator).collect().await
}

fn contents(frames: &[SseFrame]) -> Vec<String> {
    frames
        .iter()
        .filter_map(|f| f.json_value())
        .filter_map(|v| v["choices"][0]["delta"]["content"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_openai_stream_scenario() {
    let deliveries = vec![
        Delivery::Event(BackendEvent::System(Default::default())),
        message_start(),
        event(StreamSubEvent::text("A")),
        event(StreamSubEvent::text("B")),
        end_turn(),
        event(StreamSubEvent::MessageStop),
        Delivery::Event(BackendEvent::assistant_text("AB")),
        Delivery::Event(BackendEvent::result(Some(Usage::new(3, 2)))),
        Delivery::Done { exit_code: 0 },
    ];
    let frames = run(deliveries, OpenAiStreamTranslator::new("m", false)).await;

    assert_eq!(frames.len(), 5);
    assert_eq!(contents(&frames), vec!["", "A", "B"]);
    let last = frames[3].json_value().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert!(frames[4].is_done());
    assert_eq!(frames.iter().filter(|f| f.is_done()).count(), 1);
}

#[tokio::test]
async fn test_openai_crash_mid_stream() {
    let deliveries = vec![
        message_start(),
        event(StreamSubEvent::text("A")),
        Delivery::Failed(BackendError::ExitFailure { code: Some(1) }),
    ];
    let frames = run(deliveries, OpenAiStreamTranslator::new("m", false)).await;

    assert_eq!(frames.len(), 4);
    let error = frames[2].json_value().unwrap();
    assert!(error["error"]["message"].as_str().unwrap().contains('1'));
    assert!(frames[3].is_done());
}

#[tokio::test]
async fn test_openai_done_without_message_stop() {
    let deliveries = vec![
        Delivery::Event(BackendEvent::assistant_text("no partials")),
        Delivery::Done { exit_code: 0 },
    ];
    let frames = run(deliveries, OpenAiStreamTranslator::new("m", true)).await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].json_value().unwrap()["choices"][0]["finish_reason"], "stop");
    assert!(frames[2].is_done());
}

#[tokio::test]
async fn test_closed_channel_ends_with_error() {
    let deliveries = vec![message_start()];
    let frames = run(deliveries, OpenAiStreamTranslator::new("m", false)).await;
    assert!(frames.last().unwrap().is_done());
    assert!(frames[frames.len() - 2].json_value().unwrap().get("error").is_some());

    let deliveries = vec![message_start()];
    let frames = frames_anthropic(deliveries).await;
    assert_eq!(frames.last().unwrap().event, Some("error"));
}

async fn frames_anthropic(deliveries: Vec<Delivery>) -> Vec<SseFrame> {
    run(deliveries, AnthropicStreamTranslator::new("claude-sonnet-4-5")).await
}

#[tokio::test]
async fn test_anthropic_stream_scenario() {
    let deliveries = vec![
        message_start(),
        event(StreamSubEvent::ContentBlockStart {
            index: 0,
            content_block: conduit_core::ContentBlock::text(""),
        }),
        event(StreamSubEvent::text("Hi")),
        event(StreamSubEvent::ContentBlockStop { index: 0 }),
        end_turn(),
        event(StreamSubEvent::MessageStop),
        Delivery::Event(BackendEvent::result(Some(Usage::new(3, 2)))),
        Delivery::Done { exit_code: 0 },
    ];
    let frames = frames_anthropic(deliveries).await;

    let names: Vec<_> = frames.iter().filter_map(|f| f.event).collect();
    assert_eq!(
        names,
        vec![
            "message_start",
            "content_block_start",
            "content_block_delta",
            "content_block_stop",
            "message_delta",
            "message_stop",
        ]
    );
    assert!(frames[0].encode().starts_with("event: message_start\ndata: {"));
}

#[tokio::test]
async fn test_anthropic_failure_emits_one_error_event() {
    let deliveries = vec![
        message_start(),
        event(StreamSubEvent::text("Hi")),
        Delivery::Failed(BackendError::Timeout { seconds: 30 }),
        Delivery::Done { exit_code: 0 },
    ];
    let frames = frames_anthropic(deliveries).await;

    let errors = frames.iter().filter(|f| f.event == Some("error")).count();
    assert_eq!(errors, 1);
    assert_eq!(frames.last().unwrap().event, Some("error"));
}

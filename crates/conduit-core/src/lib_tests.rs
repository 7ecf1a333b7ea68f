use super::*;

#[test]
fn test_parse_system_init() {
    let line = r#"{"type":"system","subtype":"init","session_id":"abc","model":"claude-sonnet-4-5","tools":["Read"]}"#;
    let event = BackendEvent::parse_line(line).unwrap();
    match event {
        BackendEvent::System(system) => {
            assert_eq!(system.subtype.as_deref(), Some("init"));
            assert_eq!(system.model.as_deref(), Some("claude-sonnet-4-5"));
        }
        other => panic!("Expected system event, got {:?}", other),
    }
}

#[test]
fn test_parse_assistant_message() {
    let line = r#"{"type":"assistant","message":{"id":"msg_backend","model":"claude","content":[{"type":"text","text":"Hi"},{"type":"text","text":"!"}],"stop_reason":null,"usage":{"input_tokens":3,"output_tokens":2}}}"#;
    let event = BackendEvent::parse_line(line).unwrap();
    match event {
        BackendEvent::Assistant(assistant) => {
            assert_eq!(assistant.message.text(), "Hi!");
            assert_eq!(assistant.message.usage, Some(Usage::new(3, 2)));
        }
        other => panic!("Expected assistant event, got {:?}", other),
    }
}

#[test]
fn test_parse_stream_events() {
    let start = BackendEvent::parse_line(
        r#"{"type":"stream_event","event":{"type":"message_start","message":{"id":"msg_x","model":"m","usage":{"input_tokens":7,"output_tokens":1}}}}"#,
    )
    .unwrap();
    assert_eq!(start.sub_event().and_then(|e| e.usage()), Some(&Usage::new(7, 1)));

    let delta = BackendEvent::parse_line(
        r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"A"}}}"#,
    )
    .unwrap();
    assert_eq!(delta.sub_event().and_then(|e| e.text_delta()), Some("A"));

    let message_delta = BackendEvent::parse_line(
        r#"{"type":"stream_event","event":{"type":"message_delta","delta":{"stop_reason":"max_tokens","stop_sequence":null},"usage":{"output_tokens":12}}}"#,
    )
    .unwrap();
    match message_delta.sub_event() {
        Some(StreamSubEvent::MessageDelta { delta, usage }) => {
            assert_eq!(delta.stop_reason.as_deref(), Some("max_tokens"));
            assert_eq!(usage.map(|u| u.output_tokens), Some(12));
        }
        other => panic!("Expected message_delta, got {:?}", other),
    }

    let stop = BackendEvent::parse_line(r#"{"type":"stream_event","event":{"type":"message_stop"}}"#).unwrap();
    assert_eq!(stop.sub_event(), Some(&StreamSubEvent::MessageStop));
}

#[test]
fn test_parse_result() {
    let line = r#"{"type":"result","subtype":"success","is_error":false,"duration_ms":1234,"result":"Hi!","usage":{"input_tokens":3,"output_tokens":2},"total_cost_usd":0.0001}"#;
    let event = BackendEvent::parse_line(line).unwrap();
    assert!(event.is_terminal());
    match event {
        BackendEvent::Result(result) => {
            assert_eq!(result.duration_ms, Some(1234));
            assert_eq!(result.usage, Some(Usage::new(3, 2)));
        }
        other => panic!("Expected result event, got {:?}", other),
    }
}

#[test]
fn test_unknown_types_do_not_fail() {
    let event = BackendEvent::parse_line(r#"{"type":"control_response","response":{}}"#).unwrap();
    assert_eq!(event, BackendEvent::Unknown);

    let event =
        BackendEvent::parse_line(r#"{"type":"stream_event","event":{"type":"future_event"}}"#).unwrap();
    assert_eq!(event.sub_event(), Some(&StreamSubEvent::Unknown));
}

#[test]
fn test_malformed_line_is_an_error() {
    assert!(BackendEvent::parse_line("not json").is_err());
    assert!(BackendEvent::parse_line(r#"{"type":"assistant"}"#).is_err());
    assert!(BackendEvent::parse_line(r#"{"no_type":true}"#).is_err());
}

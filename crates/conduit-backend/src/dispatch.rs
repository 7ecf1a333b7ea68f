//! Reads framed stdout lines, parses them and hands events to the manager.

use std::sync::Weak;

use conduit_core::BackendEvent;
use conduit_observability::BackendMetrics;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, trace, warn};

use crate::codec::{BackendLineCodec, RawLine};
use crate::process::ProcessObserver;

/// Parse one stdout line.
///
/// Returns `None` for blank, malformed or unknown lines; those are logged and
/// never reach a request.
pub fn parse_line(line: &str) -> Option<BackendEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match BackendEvent::parse_line(line) {
        Ok(BackendEvent::Unknown) => {
            debug!("Dropping backend event with unknown type: {}", preview(line));
            None
        }
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, line = %preview(line), "Discarding malformed backend line");
            BackendMetrics::record_malformed_line();
            None
        }
    }
}

fn preview(line: &str) -> &str {
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Spawn the stdout reader for one process generation.
///
/// Ends at EOF, on a read error, or once the manager is gone.
pub(crate) fn spawn_reader<R>(
    stdout: R,
    max_line_bytes: usize,
    generation: u64,
    observer: Weak<dyn ProcessObserver>,
) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = FramedRead::new(stdout, BackendLineCodec::new(max_line_bytes));

        while let Some(frame) = lines.next().await {
            let event = match frame {
                Ok(RawLine::Text(line)) => match parse_line(&line) {
                    Some(event) => event,
                    None => continue,
                },
                Ok(RawLine::Oversized) => {
                    warn!(generation, max_line_bytes, "Discarding oversized backend line");
                    BackendMetrics::record_malformed_line();
                    continue;
                }
                Ok(RawLine::InvalidUtf8) => {
                    warn!(generation, "Discarding non-UTF-8 backend line");
                    BackendMetrics::record_malformed_line();
                    continue;
                }
                Err(e) => {
                    warn!(generation, error = %e, "Backend stdout read failed");
                    break;
                }
            };

            trace!(generation, kind = event.kind(), "Backend event");
            match observer.upgrade() {
                Some(observer) => observer.on_event(generation, event),
                None => break,
            }
        }

        debug!(generation, "Backend stdout closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::StreamSubEvent;

    #[test]
    fn test_parse_line_accepts_known_events() {
        let event = parse_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"A"}}}"#,
        )
        .unwrap();
        assert_eq!(event.sub_event().and_then(StreamSubEvent::text_delta), Some("A"));
    }

    #[test]
    fn test_parse_line_drops_garbage() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("npm WARN something").is_none());
        assert!(parse_line(r#"{"type":"assistant","message":"#).is_none());
        assert!(parse_line(r#"{"type":"telemetry","payload":{}}"#).is_none());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        assert_eq!(preview(&long).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}

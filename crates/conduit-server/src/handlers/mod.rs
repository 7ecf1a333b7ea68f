pub mod anthropic;
pub mod openai;
pub mod system;

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use conduit_llm::SseFrame;
use futures::{Stream, StreamExt};

/// `text/event-stream` response over pre-encoded frames
pub(crate) fn sse_response<S>(frames: S) -> Response
where
    S: Stream<Item = SseFrame> + Send + 'static,
{
    let body = Body::from_stream(frames.map(|frame| Ok::<_, Infallible>(Bytes::from(frame.encode()))));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

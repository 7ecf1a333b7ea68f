//! `POST /v1/messages`

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use conduit_llm::adapters::anthropic::MessagesRequest;
use conduit_llm::{translate, AnthropicStreamTranslator, ResponseAggregator};
use conduit_observability::{create_request_span, HttpMetrics};
use tracing::Instrument;

use super::sse_response;
use crate::error::{Api, ApiError};
use crate::state::AppState;

pub async fn messages(
    State(state): State<AppState>,
    payload: Result<Json<MessagesRequest>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = create_request_span(&request_id, Api::Anthropic.as_str());
    handle(state, payload).instrument(span).await
}

async fn handle(state: AppState, payload: Result<Json<MessagesRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ApiError::invalid_request(Api::Anthropic, rejection.body_text())
                .into_response()
        }
    };
    HttpMetrics::record_request(Api::Anthropic.as_str(), request.stream);

    let prompt = match request.to_prompt() {
        Ok(prompt) => prompt,
        Err(e) => return ApiError::conversion(Api::Anthropic, e).into_response(),
    };
    let model = state.resolve_model(request.model.as_deref());
    tracing::info!(model = %model, stream = request.stream, "Messages request");

    let handle = state.manager.send_message(prompt);

    if request.stream {
        return sse_response(translate(handle, AnthropicStreamTranslator::new(model)));
    }

    match handle.completion().await {
        Ok(completed) => {
            let message = ResponseAggregator::from_events(&completed.events).into_message(&model);
            Json(message).into_response()
        }
        Err(e) => {
            tracing::warn!("Messages request failed: {}", e);
            ApiError::backend(Api::Anthropic, &e).into_response()
        }
    }
}

//! `POST /v1/chat/completions`

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use conduit_llm::adapters::openai::ChatCompletionRequest;
use conduit_llm::{translate, OpenAiStreamTranslator, ResponseAggregator};
use conduit_observability::{create_request_span, HttpMetrics};
use tracing::Instrument;

use super::sse_response;
use crate::error::{Api, ApiError};
use crate::state::AppState;

pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = create_request_span(&request_id, Api::OpenAi.as_str());
    handle(state, payload).instrument(span).await
}

async fn handle(
    state: AppState,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ApiError::invalid_request(Api::OpenAi, rejection.body_text()).into_response()
        }
    };
    HttpMetrics::record_request(Api::OpenAi.as_str(), request.stream);

    let prompt = match request.to_prompt() {
        Ok(prompt) => prompt,
        Err(e) => return ApiError::conversion(Api::OpenAi, e).into_response(),
    };
    let model = state.resolve_model(request.model.as_deref());
    tracing::info!(model = %model, stream = request.stream, "Chat completion request");

    let handle = state.manager.send_message(prompt);
    tracing::debug!(backend_request = handle.id(), "Submitted to backend");

    if request.stream {
        let translator = OpenAiStreamTranslator::new(model, request.include_usage());
        return sse_response(translate(handle, translator));
    }

    match handle.completion().await {
        Ok(completed) => {
            let completion =
                ResponseAggregator::from_events(&completed.events).into_chat_completion(&model);
            Json(completion).into_response()
        }
        Err(e) => {
            tracing::warn!("Chat completion failed: {}", e);
            ApiError::backend(Api::OpenAi, &e).into_response()
        }
    }
}

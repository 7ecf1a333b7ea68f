use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use conduit_backend::BackendError;
use conduit_llm::adapters::{anthropic, openai};
use conduit_llm::ConversionError;
use conduit_observability::HttpMetrics;

/// Which downstream protocol a request arrived on; decides the error body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Api {
    OpenAi,
    Anthropic,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::OpenAi => "openai",
            Api::Anthropic => "anthropic",
        }
    }
}

/// Error returned to a non-streaming caller
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    api: Api,
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid_request(api: Api, message: impl Into<String>) -> Self {
        Self {
            api,
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request_error",
            message: message.into(),
        }
    }

    pub fn conversion(api: Api, error: ConversionError) -> Self {
        Self::invalid_request(api, error.to_string())
    }

    /// Backend failures surface as 502 regardless of kind.
    pub fn backend(api: Api, error: &BackendError) -> Self {
        HttpMetrics::record_error(api.as_str(), error.kind());
        let kind = match api {
            Api::OpenAi => "backend_error",
            Api::Anthropic => "api_error",
        };
        Self {
            api,
            status: StatusCode::BAD_GATEWAY,
            kind,
            message: error.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.api {
            Api::OpenAi => {
                let body = openai::ErrorResponse::new(self.kind, self.message);
                (self.status, Json(body)).into_response()
            }
            Api::Anthropic => {
                let body = anthropic::ErrorResponse::new(self.kind, self.message);
                (self.status, Json(body)).into_response()
            }
        }
    }
}

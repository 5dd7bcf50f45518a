use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Body of every failed response: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A failed API operation.
///
/// The store does not distinguish "not found" from other failures at this
/// boundary, so every variant renders as 500 with a fixed message. The
/// cause is logged by the handler, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    Fetch,
    Create,
    Update,
    Delete,
}

impl ApiError {
    pub fn message(self) -> &'static str {
        match self {
            ApiError::Fetch => "Failed to fetch todos",
            ApiError::Create => "Failed to create todo",
            ApiError::Update => "Failed to update todo",
            ApiError::Delete => "Failed to delete todo",
        }
    }

    pub fn status(self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn renders_internal_error_with_message() {
        let response = ApiError::Delete.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Failed to delete todo");
    }
}

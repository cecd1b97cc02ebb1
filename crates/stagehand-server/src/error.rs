//! Exposure error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stagehand_core::StagehandError;
use thiserror::Error;

/// Failure while exposing loader state for a request.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ExposeError(#[from] pub StagehandError);

impl IntoResponse for ExposeError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let code = match &self.0 {
            StagehandError::Contributor { .. } => "EXPOSURE_CONTRIBUTOR_FAILED",
            _ => "EXPOSURE_FAILED",
        };
        tracing::error!(code, "Exposure failed: {}", self.0);

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ExposeResult<T> = Result<T, ExposeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: StagehandError) -> (StatusCode, serde_json::Value) {
        let response = ExposeError::from(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_error_codes() {
        let (status, body) = body_of(StagehandError::Contributor {
            name: "seed".to_string(),
            message: "bad module".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "EXPOSURE_CONTRIBUTOR_FAILED");

        let (status, body) = body_of(StagehandError::Setup("no runtime".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "EXPOSURE_FAILED");
        assert!(body["error"]["message"].as_str().unwrap().contains("no runtime"));
    }
}

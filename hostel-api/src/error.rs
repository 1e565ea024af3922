use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hostel_core::payment::Payment;
use hostel_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    /// Reported as 400, like every other business conflict on this surface.
    ConflictError(String),
    PendingPayment(Box<Payment>),
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, json!({ "message": msg })),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, json!({ "message": msg })),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            AppError::ConflictError(msg) => (StatusCode::BAD_REQUEST, json!({ "message": msg })),
            AppError::PendingPayment(existing) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "message": "A pending payment already exists for this booking",
                    "existing_payment": existing,
                }),
            ),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "message": "Payment gateway is unavailable, please try again" }),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "Internal Server Error" }))
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "message": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            CoreError::Forbidden(msg) => AppError::AuthorizationError(msg),
            CoreError::PendingPaymentExists(existing) => AppError::PendingPayment(existing),
            CoreError::VerificationFailed(msg) => AppError::ValidationError(format!("Payment verification failed: {}", msg)),
            CoreError::Upstream(msg) => AppError::UpstreamError(msg),
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            _ => "Request body has missing or malformed fields",
        };
        AppError::ValidationError(message.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected query string");
        AppError::ValidationError("Invalid query parameters".to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected path parameter");
        AppError::ValidationError("Invalid path parameter".to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_is_bad_request() {
        let (status, body) = render(CoreError::Conflict("Room already booked".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Room already booked");
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_returned() {
        let (status, body) = render(CoreError::InternalError("relation \"bookings\" does not exist".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_upstream_is_bad_gateway() {
        let (status, _) = render(CoreError::Upstream("503".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}

use {
    crate::domain::error::PaymentError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Newtype so the domain error can be returned straight from handlers.
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retryable = self.0.is_retryable();
        let mut details = None;

        let (status, error_code, message) = match self.0 {
            PaymentError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
            }
            PaymentError::AmountRejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "amount_rejected",
                rejection.to_string(),
            ),
            PaymentError::GatewayValidation {
                message,
                details: gateway_details,
            } => {
                details = Some(gateway_details);
                (StatusCode::UNPROCESSABLE_ENTITY, "gateway_rejected", message)
            }
            PaymentError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            PaymentError::Authenticity(msg) => {
                tracing::warn!(reason = %msg, "webhook rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "webhook_unauthenticated",
                    "invalid webhook signature".to_string(),
                )
            }
            PaymentError::MalformedWebhook(msg) => {
                (StatusCode::BAD_REQUEST, "webhook_malformed", msg)
            }
            PaymentError::GatewayTransient(msg) => {
                tracing::warn!("gateway unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "gateway_unavailable",
                    "payment gateway unavailable, try again".to_string(),
                )
            }
            PaymentError::GatewayTerminal(msg) => {
                tracing::error!("gateway error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "payment gateway error".to_string(),
                )
            }
            PaymentError::Reconciliation(msg) => {
                tracing::error!("reconciliation error: {msg}");
                internal()
            }
            PaymentError::Database(err) => {
                tracing::error!("database error: {err}");
                internal()
            }
            PaymentError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                internal()
            }
        };

        let mut body = serde_json::json!({
            "error_code": error_code,
            "message": message,
            "retryable": retryable,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error".to_string(),
    )
}

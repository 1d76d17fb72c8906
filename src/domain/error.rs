use {
    super::{amount_policy::AmountRejection, gateway::GatewayError},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("amount rejected: {0}")]
    AmountRejected(#[from] AmountRejection),

    /// The gateway refused the request content on both attempts.
    #[error("gateway rejected request: {message}")]
    GatewayValidation {
        message: String,
        details: serde_json::Value,
    },

    #[error("gateway unavailable: {0}")]
    GatewayTransient(String),

    #[error("gateway error: {0}")]
    GatewayTerminal(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("webhook authenticity: {0}")]
    Authenticity(String),

    #[error("malformed webhook: {0}")]
    MalformedWebhook(String),

    #[error("reconciliation: {0}")]
    Reconciliation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaymentError {
    /// Whether the caller may resubmit the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayTransient(_) | Self::Database(_))
    }
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation { status, messages } => Self::GatewayValidation {
                message: format!("gateway returned {status}"),
                details: messages,
            },
            GatewayError::Transient(msg) => Self::GatewayTransient(msg),
            GatewayError::Terminal(msg) => Self::GatewayTerminal(msg),
        }
    }
}

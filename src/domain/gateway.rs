use {
    super::{
        BoxFuture,
        id::{ExternalId, Reference},
        money::{Currency, Money, MoneyAmount},
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    thiserror::Error,
};

/// Transaction status as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GatewayStatus {
    Pending,
    Approved,
    Declined,
    Voided,
    Error,
    Other(String),
}

impl GatewayStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Voided => "VOIDED",
            Self::Error => "ERROR",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for GatewayStatus {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "APPROVED" => Self::Approved,
            "DECLINED" => Self::Declined,
            "VOIDED" => Self::Voided,
            "ERROR" => Self::Error,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for GatewayStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<GatewayStatus> for String {
    fn from(status: GatewayStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for GatewayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// 4xx: the request content was refused. The caller can fix it.
    #[error("gateway validation error ({status}): {messages}")]
    Validation {
        status: u16,
        messages: serde_json::Value,
    },

    /// 5xx, 429, timeouts, connection failures.
    #[error("transient gateway error: {0}")]
    Transient(String),

    #[error("gateway error: {0}")]
    Terminal(String),
}

/// Presigned terms-of-service acceptance, required for card and PSE flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceTokens {
    pub acceptance_token: String,
    pub personal_auth_token: String,
}

/// Everything about a transaction request except the idempotency reference.
/// Each attempt derives an immutable [`TransactionRequest`] from it.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub money: Money,
    pub customer_email: String,
    pub payment_method: serde_json::Value,
    pub acceptance: Option<AcceptanceTokens>,
    pub redirect_url: Option<String>,
}

impl TransactionDraft {
    pub fn attempt(&self, reference: Reference) -> TransactionRequest {
        TransactionRequest {
            reference,
            money: self.money,
            customer_email: self.customer_email.clone(),
            payment_method: self.payment_method.clone(),
            acceptance: self.acceptance.clone(),
            redirect_url: self.redirect_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub reference: Reference,
    pub money: Money,
    pub customer_email: String,
    pub payment_method: serde_json::Value,
    pub acceptance: Option<AcceptanceTokens>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentLinkDraft {
    pub name: String,
    pub description: String,
    pub money: Money,
    pub single_use: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub redirect_url: Option<String>,
}

impl PaymentLinkDraft {
    pub fn attempt(&self, reference: Reference) -> PaymentLinkRequest {
        PaymentLinkRequest {
            reference,
            name: self.name.clone(),
            description: self.description.clone(),
            money: self.money,
            single_use: self.single_use,
            expires_at: self.expires_at,
            redirect_url: self.redirect_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentLinkRequest {
    pub reference: Reference,
    pub name: String,
    pub description: String,
    pub money: Money,
    pub single_use: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VoidRequest {
    pub transaction_id: ExternalId,
    pub amount: Option<MoneyAmount>,
    pub reason: Option<String>,
}

/// The gateway's view of a transaction.
#[derive(Debug, Clone)]
pub struct GatewayTransaction {
    pub id: ExternalId,
    pub status: GatewayStatus,
    pub amount: MoneyAmount,
    pub currency: Currency,
    pub reference: String,
    pub payment_link_id: Option<String>,
    pub redirect_url: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GatewayLink {
    pub id: String,
    pub permalink: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GatewayVoid {
    pub transaction_id: ExternalId,
    pub status: GatewayStatus,
    pub raw: serde_json::Value,
}

pub type GatewayResult<'a, T> = BoxFuture<'a, Result<T, GatewayError>>;

pub trait PaymentGateway: Send + Sync {
    fn create_transaction<'a>(
        &'a self,
        request: &'a TransactionRequest,
    ) -> GatewayResult<'a, GatewayTransaction>;

    fn create_payment_link<'a>(
        &'a self,
        request: &'a PaymentLinkRequest,
    ) -> GatewayResult<'a, GatewayLink>;

    fn confirm_transaction<'a>(
        &'a self,
        id: &'a ExternalId,
        proof: &'a serde_json::Value,
    ) -> GatewayResult<'a, GatewayTransaction>;

    fn get_transaction<'a>(&'a self, id: &'a ExternalId) -> GatewayResult<'a, GatewayTransaction>;

    fn void_transaction<'a>(&'a self, request: &'a VoidRequest) -> GatewayResult<'a, GatewayVoid>;

    fn acceptance_tokens(&self) -> GatewayResult<'_, AcceptanceTokens>;
}

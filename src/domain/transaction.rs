use {
    super::{
        error::PaymentError,
        gateway::GatewayStatus,
        id::{ExternalId, Reference},
        money::Money,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Total mapping from the gateway vocabulary. Anything unrecognised is
    /// treated as still in flight.
    pub fn from_gateway(status: &GatewayStatus) -> Self {
        match status {
            GatewayStatus::Approved => Self::Completed,
            GatewayStatus::Declined | GatewayStatus::Error => Self::Failed,
            GatewayStatus::Voided => Self::Refunded,
            GatewayStatus::Pending | GatewayStatus::Other(_) => Self::Pending,
        }
    }

    /// Lifecycle rank, higher means further along. A late event must not
    /// move a settled transaction back to an earlier rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending | Self::Processing => 0,
            Self::Completed | Self::Failed | Self::Cancelled => 1,
            Self::Refunded => 2,
        }
    }

    pub fn would_regress_to(&self, next: TransactionStatus) -> bool {
        next.rank() < self.rank()
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(PaymentError::Validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub external_id: Option<ExternalId>,
    pub payment_link_id: Option<String>,
    pub reference: String,
    pub money: Money,
    pub status: TransactionStatus,
    pub raw_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub external_id: Option<ExternalId>,
    pub payment_link_id: Option<String>,
    pub reference: Reference,
    pub money: Money,
    pub status: TransactionStatus,
    pub raw_response: serde_json::Value,
}

impl NewTransaction {
    pub fn new(
        purchase_id: Uuid,
        reference: Reference,
        money: Money,
        status: TransactionStatus,
        raw_response: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            purchase_id,
            external_id: None,
            payment_link_id: None,
            reference,
            money,
            status,
            raw_response,
        }
    }

    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn with_payment_link(mut self, payment_link_id: impl Into<String>) -> Self {
        self.payment_link_id = Some(payment_link_id.into());
        self
    }
}

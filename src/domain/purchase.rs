use {
    super::{
        error::PaymentError,
        gateway::GatewayStatus,
        id::Reference,
        money::Money,
        transaction::TransactionStatus,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn from_gateway(status: &GatewayStatus) -> Self {
        TransactionStatus::from_gateway(status).into()
    }
}

impl From<TransactionStatus> for PurchaseStatus {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending | TransactionStatus::Processing => Self::Pending,
            TransactionStatus::Completed => Self::Completed,
            TransactionStatus::Failed => Self::Failed,
            TransactionStatus::Cancelled => Self::Cancelled,
            TransactionStatus::Refunded => Self::Refunded,
        }
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PurchaseStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            other => Err(PaymentError::Validation(format!(
                "unknown purchase status: {other}"
            ))),
        }
    }
}

/// What is being paid for: a package or a single service, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PurchaseTarget {
    Package(Uuid),
    Service(Uuid),
}

impl PurchaseTarget {
    pub fn from_columns(
        package_id: Option<Uuid>,
        service_id: Option<Uuid>,
    ) -> Result<Self, PaymentError> {
        match (package_id, service_id) {
            (Some(id), None) => Ok(Self::Package(id)),
            (None, Some(id)) => Ok(Self::Service(id)),
            (p, s) => Err(PaymentError::Validation(format!(
                "purchase must reference exactly one of package/service, got package={p:?} service={s:?}"
            ))),
        }
    }

    pub fn package_id(&self) -> Option<Uuid> {
        match self {
            Self::Package(id) => Some(*id),
            Self::Service(_) => None,
        }
    }

    pub fn service_id(&self) -> Option<Uuid> {
        match self {
            Self::Service(id) => Some(*id),
            Self::Package(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub target: PurchaseTarget,
    pub money: Money,
    pub status: PurchaseStatus,
    pub reference: String,
    pub expires_at: DateTime<Utc>,
    pub payment_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// For INSERT. Always starts out `pending`.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub target: PurchaseTarget,
    pub money: Money,
    pub reference: Reference,
    pub expires_at: DateTime<Utc>,
    pub payment_details: serde_json::Value,
}

impl NewPurchase {
    pub fn pending(
        payer_id: Uuid,
        target: PurchaseTarget,
        money: Money,
        reference: Reference,
        expires_at: DateTime<Utc>,
        payment_details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            payer_id,
            target,
            money,
            reference,
            expires_at,
            payment_details,
        }
    }
}

use {
    super::error::PaymentError,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementStatus {
    Active,
    Expired,
    Exhausted,
    Cancelled,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<&str> for EntitlementStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "exhausted" => Ok(Self::Exhausted),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(PaymentError::Validation(format!(
                "unknown entitlement status: {other}"
            ))),
        }
    }
}

/// Purchased sessions of one service.
#[derive(Debug, Clone, Serialize)]
pub struct Entitlement {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub service_id: Uuid,
    pub remaining: i32,
    pub expires_at: DateTime<Utc>,
    pub status: EntitlementStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEntitlement {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub service_id: Uuid,
    pub remaining: i32,
    pub expires_at: DateTime<Utc>,
}

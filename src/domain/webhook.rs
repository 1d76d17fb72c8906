use {
    super::{
        error::PaymentError,
        gateway::GatewayStatus,
        id::ExternalId,
        money::MoneyAmount,
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

pub const PROVIDER: &str = "gateway";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for WebhookStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "received" => Ok(Self::Received),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(PaymentError::Validation(format!(
                "unknown webhook status: {other}"
            ))),
        }
    }
}

/// The closed set of event kinds the gateway sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEventKind {
    TransactionUpdated,
    NequiTokenUpdated,
    BancolombiaTransferTokenUpdated,
    Other(String),
}

impl GatewayEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::TransactionUpdated => "transaction.updated",
            Self::NequiTokenUpdated => "nequi_token.updated",
            Self::BancolombiaTransferTokenUpdated => "bancolombia_transfer_token.updated",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for GatewayEventKind {
    fn from(s: &str) -> Self {
        match s {
            "transaction.updated" => Self::TransactionUpdated,
            "nequi_token.updated" => Self::NequiTokenUpdated,
            "bancolombia_transfer_token.updated" => Self::BancolombiaTransferTokenUpdated,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GatewayEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSignature {
    pub properties: Vec<String>,
    pub checksum: String,
}

/// Top-level body of a gateway notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub signature: Option<EventSignature>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub sent_at: Option<String>,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        serde_json::from_slice(body)
            .map_err(|e| PaymentError::MalformedWebhook(format!("invalid envelope: {e}")))
    }

    pub fn kind(&self) -> GatewayEventKind {
        GatewayEventKind::from(self.event.as_str())
    }
}

#[derive(Deserialize)]
struct TransactionData {
    transaction: TransactionWire,
}

#[derive(Deserialize)]
struct TransactionWire {
    id: String,
    status: String,
    amount_in_cents: i64,
    currency: String,
    reference: String,
    #[serde(default)]
    payment_link_id: Option<String>,
}

/// The part of a `transaction.updated` event the reconciler acts on.
/// Currency stays as sent; a currency we do not charge in is still a
/// well-formed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub external_id: ExternalId,
    pub status: GatewayStatus,
    pub amount: MoneyAmount,
    pub currency: String,
    pub reference: String,
    pub payment_link_id: Option<String>,
}

impl TransactionUpdate {
    /// Reads `data.transaction` from an envelope's `data` object.
    pub fn from_data(data: &serde_json::Value) -> Result<Self, PaymentError> {
        let wire = TransactionData::deserialize(data)
            .map_err(|e| PaymentError::MalformedWebhook(format!("data.transaction: {e}")))?
            .transaction;

        let malformed = |e: PaymentError| PaymentError::MalformedWebhook(e.to_string());
        let amount = MoneyAmount::new(wire.amount_in_cents).map_err(malformed)?;

        Ok(Self {
            external_id: ExternalId::new(wire.id).map_err(malformed)?,
            status: GatewayStatus::from(wire.status),
            amount,
            currency: wire.currency,
            reference: wire.reference,
            payment_link_id: wire.payment_link_id.filter(|id| !id.is_empty()),
        })
    }

    /// Reads the update back out of a stored webhook payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, PaymentError> {
        let data = payload
            .get("data")
            .ok_or_else(|| PaymentError::MalformedWebhook("payload has no data".into()))?;
        Self::from_data(data)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider: String,
    pub event_type: String,
    pub external_id: ExternalId,
    pub payment_link_id: Option<String>,
    pub payload: serde_json::Value,
    pub checksum: Option<String>,
    pub status: WebhookStatus,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub note: Option<String>,
}

impl WebhookEvent {
    pub fn is_orphaned(&self) -> bool {
        self.transaction_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider: String,
    pub event_type: String,
    pub external_id: ExternalId,
    pub payment_link_id: Option<String>,
    pub payload: serde_json::Value,
    pub checksum: Option<String>,
    pub status: WebhookStatus,
    pub note: Option<String>,
}

impl NewWebhookEvent {
    pub fn linked(
        transaction_id: Uuid,
        event_type: &str,
        update: &TransactionUpdate,
        payload: serde_json::Value,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            transaction_id: Some(transaction_id),
            provider: PROVIDER.to_string(),
            event_type: event_type.to_string(),
            external_id: update.external_id.clone(),
            payment_link_id: update.payment_link_id.clone(),
            payload,
            checksum,
            status: WebhookStatus::Processing,
            note: None,
        }
    }

    pub fn orphaned(
        event_type: &str,
        update: &TransactionUpdate,
        payload: serde_json::Value,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            transaction_id: None,
            provider: PROVIDER.to_string(),
            event_type: event_type.to_string(),
            external_id: update.external_id.clone(),
            payment_link_id: update.payment_link_id.clone(),
            payload,
            checksum,
            status: WebhookStatus::Received,
            note: Some(format!(
                "no local transaction for external id {} yet",
                update.external_id
            )),
        }
    }
}

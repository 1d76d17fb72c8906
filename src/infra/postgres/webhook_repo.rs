use {
    crate::domain::{
        error::PaymentError,
        id::ExternalId,
        webhook::{NewWebhookEvent, WebhookEvent, WebhookStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

const COLUMNS: &str = "id, transaction_id, provider, event_type, external_id, payment_link_id, \
                       payload, checksum, status, received_at, processed_at, error_message, note";

#[derive(sqlx::FromRow)]
pub struct WebhookRow {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider: String,
    pub event_type: String,
    pub external_id: String,
    pub payment_link_id: Option<String>,
    pub payload: serde_json::Value,
    pub checksum: Option<String>,
    pub status: String,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub note: Option<String>,
}

impl TryFrom<WebhookRow> for WebhookEvent {
    type Error = PaymentError;

    fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
        Ok(WebhookEvent {
            id: row.id,
            transaction_id: row.transaction_id,
            provider: row.provider,
            event_type: row.event_type,
            external_id: ExternalId::new(row.external_id)?,
            payment_link_id: row.payment_link_id,
            payload: row.payload,
            checksum: row.checksum,
            status: WebhookStatus::try_from(row.status.as_str())?,
            received_at: row.received_at,
            processed_at: row.processed_at,
            error_message: row.error_message,
            note: row.note,
        })
    }
}

/// Every delivery gets its own row, duplicates included.
pub async fn insert(pool: &PgPool, event: &NewWebhookEvent) -> Result<WebhookEvent, PaymentError> {
    let row = sqlx::query_as::<_, WebhookRow>(&format!(
        r#"
        INSERT INTO webhook_events
            (id, transaction_id, provider, event_type, external_id, payment_link_id,
             payload, checksum, status, note)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(event.id)
    .bind(event.transaction_id)
    .bind(&event.provider)
    .bind(&event.event_type)
    .bind(event.external_id.as_str())
    .bind(event.payment_link_id.as_deref())
    .bind(&event.payload)
    .bind(event.checksum.as_deref())
    .bind(event.status.as_str())
    .bind(event.note.as_deref())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<WebhookEvent>, PaymentError> {
    sqlx::query_as::<_, WebhookRow>(&format!(
        "SELECT {COLUMNS} FROM webhook_events WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(WebhookEvent::try_from)
    .transpose()
}

/// Unlinked events for one external id, in arrival order.
pub async fn find_orphans(
    pool: &PgPool,
    external_id: &ExternalId,
) -> Result<Vec<WebhookEvent>, PaymentError> {
    sqlx::query_as::<_, WebhookRow>(&format!(
        r#"
        SELECT {COLUMNS} FROM webhook_events
        WHERE transaction_id IS NULL AND external_id = $1
        ORDER BY received_at, id
        "#
    ))
    .bind(external_id.as_str())
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(WebhookEvent::try_from)
    .collect()
}

pub async fn link(pool: &PgPool, id: Uuid, transaction_id: Uuid) -> Result<(), PaymentError> {
    let result = sqlx::query(
        "UPDATE webhook_events SET transaction_id = $1, status = 'processing' WHERE id = $2",
    )
    .bind(transaction_id)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(PaymentError::NotFound(format!("webhook {id}")));
    }
    Ok(())
}

pub async fn mark_processed(pool: &PgPool, id: Uuid) -> Result<(), PaymentError> {
    sqlx::query(
        r#"
        UPDATE webhook_events
        SET status = 'processed', processed_at = now(), error_message = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<(), PaymentError> {
    sqlx::query(
        r#"
        UPDATE webhook_events
        SET status = 'failed', processed_at = now(), error_message = $2
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns the number of deleted orphans.
pub async fn delete_orphans_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, PaymentError> {
    let result = sqlx::query(
        "DELETE FROM webhook_events WHERE transaction_id IS NULL AND received_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

use {
    crate::domain::{
        error::PaymentError,
        id::ExternalId,
        money::{Currency, Money, MoneyAmount},
        transaction::{NewTransaction, Transaction, TransactionStatus},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

const COLUMNS: &str = "id, purchase_id, external_id, payment_link_id, reference, amount, \
                       currency, status, raw_response, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub external_id: Option<String>,
    pub payment_link_id: Option<String>,
    pub reference: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub raw_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PaymentError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            purchase_id: row.purchase_id,
            external_id: row.external_id.map(ExternalId::new).transpose()?,
            payment_link_id: row.payment_link_id,
            reference: row.reference,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: TransactionStatus::try_from(row.status.as_str())?,
            raw_response: row.raw_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(
    pool: &PgPool,
    transaction: &NewTransaction,
) -> Result<Transaction, PaymentError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        INSERT INTO transactions
            (id, purchase_id, external_id, payment_link_id, reference,
             amount, currency, status, raw_response)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(transaction.id)
    .bind(transaction.purchase_id)
    .bind(transaction.external_id.as_ref().map(ExternalId::as_str))
    .bind(transaction.payment_link_id.as_deref())
    .bind(transaction.reference.as_str())
    .bind(transaction.money.amount().minor_units())
    .bind(transaction.money.currency().as_str())
    .bind(transaction.status.as_str())
    .bind(&transaction.raw_response)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>, PaymentError> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Transaction::try_from)
    .transpose()
}

pub async fn find_by_external_id(
    pool: &PgPool,
    external_id: &ExternalId,
) -> Result<Option<Transaction>, PaymentError> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {COLUMNS} FROM transactions WHERE external_id = $1"
    ))
    .bind(external_id.as_str())
    .fetch_optional(pool)
    .await?
    .map(Transaction::try_from)
    .transpose()
}

pub async fn find_unassigned_by_payment_link(
    pool: &PgPool,
    payment_link_id: &str,
) -> Result<Option<Transaction>, PaymentError> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        SELECT {COLUMNS} FROM transactions
        WHERE payment_link_id = $1 AND external_id IS NULL
        ORDER BY created_at
        LIMIT 1
        "#
    ))
    .bind(payment_link_id)
    .fetch_optional(pool)
    .await?
    .map(Transaction::try_from)
    .transpose()
}

/// Assigns the external id only while it is unset; re-assigning the same
/// value is a no-op.
pub async fn assign_external_id(
    pool: &PgPool,
    id: Uuid,
    external_id: &ExternalId,
) -> Result<Transaction, PaymentError> {
    let updated = sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        UPDATE transactions
        SET external_id = $1, updated_at = now()
        WHERE id = $2 AND (external_id IS NULL OR external_id = $1)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(external_id.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(row) => row.try_into(),
        None => match get(pool, id).await? {
            Some(existing) => Err(PaymentError::Reconciliation(format!(
                "transaction {id} already has external id {}",
                existing
                    .external_id
                    .as_ref()
                    .map(ExternalId::as_str)
                    .unwrap_or_default()
            ))),
            None => Err(PaymentError::NotFound(format!("transaction {id}"))),
        },
    }
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: TransactionStatus,
    raw_response: &serde_json::Value,
) -> Result<Transaction, PaymentError> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        UPDATE transactions
        SET status = $1, raw_response = $2, updated_at = now()
        WHERE id = $3
        RETURNING {COLUMNS}
        "#
    ))
    .bind(status.as_str())
    .bind(raw_response)
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PaymentError::NotFound(format!("transaction {id}")))?
    .try_into()
}

use {
    crate::domain::{
        error::PaymentError,
        id::Reference,
        money::{Currency, Money, MoneyAmount},
        purchase::{NewPurchase, Purchase, PurchaseStatus, PurchaseTarget},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

const COLUMNS: &str = "id, payer_id, package_id, service_id, amount, currency, status, \
                       reference, expires_at, payment_details, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub struct PurchaseRow {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub package_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub reference: String,
    pub expires_at: DateTime<Utc>,
    pub payment_details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = PaymentError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        Ok(Purchase {
            id: row.id,
            payer_id: row.payer_id,
            target: PurchaseTarget::from_columns(row.package_id, row.service_id)?,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: PurchaseStatus::try_from(row.status.as_str())?,
            reference: row.reference,
            expires_at: row.expires_at,
            payment_details: row.payment_details,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(pool: &PgPool, purchase: &NewPurchase) -> Result<Purchase, PaymentError> {
    let row = sqlx::query_as::<_, PurchaseRow>(&format!(
        r#"
        INSERT INTO purchases
            (id, payer_id, package_id, service_id, amount, currency, status,
             reference, expires_at, payment_details)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $8, $9)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(purchase.id)
    .bind(purchase.payer_id)
    .bind(purchase.target.package_id())
    .bind(purchase.target.service_id())
    .bind(purchase.money.amount().minor_units())
    .bind(purchase.money.currency().as_str())
    .bind(purchase.reference.as_str())
    .bind(purchase.expires_at)
    .bind(&purchase.payment_details)
    .fetch_one(pool)
    .await?;

    row.try_into()
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Purchase>, PaymentError> {
    sqlx::query_as::<_, PurchaseRow>(&format!("SELECT {COLUMNS} FROM purchases WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(Purchase::try_from)
        .transpose()
}

pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: PurchaseStatus,
) -> Result<Purchase, PaymentError> {
    sqlx::query_as::<_, PurchaseRow>(&format!(
        "UPDATE purchases SET status = $1, updated_at = now() WHERE id = $2 RETURNING {COLUMNS}"
    ))
    .bind(status.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| PaymentError::NotFound(format!("purchase {id}")))?
    .try_into()
}

pub async fn update_reference(
    pool: &PgPool,
    id: Uuid,
    reference: &Reference,
) -> Result<(), PaymentError> {
    let result =
        sqlx::query("UPDATE purchases SET reference = $1, updated_at = now() WHERE id = $2")
            .bind(reference.as_str())
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(PaymentError::NotFound(format!("purchase {id}")));
    }
    Ok(())
}

/// Purchases stuck in `pending`, oldest first.
pub async fn list_pending(
    pool: &PgPool,
    created_before: DateTime<Utc>,
) -> Result<Vec<Purchase>, PaymentError> {
    sqlx::query_as::<_, PurchaseRow>(&format!(
        r#"
        SELECT {COLUMNS} FROM purchases
        WHERE status = 'pending' AND created_at < $1
        ORDER BY created_at
        "#
    ))
    .bind(created_before)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Purchase::try_from)
    .collect()
}

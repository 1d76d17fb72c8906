use {
    crate::domain::{
        entitlement::{Entitlement, EntitlementStatus, NewEntitlement},
        error::PaymentError,
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
pub struct EntitlementRow {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub service_id: Uuid,
    pub remaining: i32,
    pub expires_at: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for Entitlement {
    type Error = PaymentError;

    fn try_from(row: EntitlementRow) -> Result<Self, Self::Error> {
        Ok(Entitlement {
            id: row.id,
            purchase_id: row.purchase_id,
            service_id: row.service_id,
            remaining: row.remaining,
            expires_at: row.expires_at,
            status: EntitlementStatus::try_from(row.status.as_str())?,
            created_at: row.created_at,
        })
    }
}

pub async fn exists_for_purchase(pool: &PgPool, purchase_id: Uuid) -> Result<bool, PaymentError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM entitlements WHERE purchase_id = $1)",
    )
    .bind(purchase_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Inserts all rows in one transaction. The (purchase_id, service_id) unique
/// key turns a concurrent second grant into a no-op.
pub async fn insert_many(
    pool: &PgPool,
    entitlements: &[NewEntitlement],
) -> Result<u64, PaymentError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for e in entitlements {
        let result = sqlx::query(
            r#"
            INSERT INTO entitlements (id, purchase_id, service_id, remaining, expires_at, status)
            VALUES ($1, $2, $3, $4, $5, 'active')
            ON CONFLICT (purchase_id, service_id) DO NOTHING
            "#,
        )
        .bind(e.id)
        .bind(e.purchase_id)
        .bind(e.service_id)
        .bind(e.remaining)
        .bind(e.expires_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn list_for_purchase(
    pool: &PgPool,
    purchase_id: Uuid,
) -> Result<Vec<Entitlement>, PaymentError> {
    sqlx::query_as::<_, EntitlementRow>(
        r#"
        SELECT id, purchase_id, service_id, remaining, expires_at, status, created_at
        FROM entitlements
        WHERE purchase_id = $1
        ORDER BY created_at, id
        "#,
    )
    .bind(purchase_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Entitlement::try_from)
    .collect()
}

use {
    crate::domain::{
        catalog::{Package, PackageItem, Service},
        error::PaymentError,
        money::{Currency, Money, MoneyAmount},
    },
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    name: String,
    price: i64,
    currency: String,
    validity_days: i32,
    active: bool,
}

impl ItemRow {
    fn price(&self) -> Result<Money, PaymentError> {
        Ok(Money::new(
            MoneyAmount::new(self.price)?,
            Currency::try_from(self.currency.as_str())?,
        ))
    }
}

pub async fn get_service(pool: &PgPool, id: Uuid) -> Result<Option<Service>, PaymentError> {
    let row = sqlx::query_as::<_, ItemRow>(
        "SELECT id, name, price, currency, validity_days, active FROM services WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| -> Result<Service, PaymentError> {
        Ok(Service {
            price: row.price()?,
            id: row.id,
            name: row.name,
            validity_days: row.validity_days,
            active: row.active,
        })
    })
    .transpose()
}

pub async fn get_package(pool: &PgPool, id: Uuid) -> Result<Option<Package>, PaymentError> {
    let Some(row) = sqlx::query_as::<_, ItemRow>(
        "SELECT id, name, price, currency, validity_days, active FROM packages WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT service_id, sessions FROM package_items WHERE package_id = $1 ORDER BY service_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(service_id, sessions)| PackageItem {
        service_id,
        sessions,
    })
    .collect();

    Ok(Some(Package {
        price: row.price()?,
        id: row.id,
        name: row.name,
        validity_days: row.validity_days,
        active: row.active,
        items,
    }))
}

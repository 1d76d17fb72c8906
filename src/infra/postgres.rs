pub mod catalog_repo;
pub mod entitlement_repo;
pub mod purchase_repo;
pub mod transaction_repo;
pub mod webhook_repo;

use {
    crate::domain::{
        catalog::{Package, Service},
        entitlement::{Entitlement, NewEntitlement},
        id::{ExternalId, Reference},
        purchase::{NewPurchase, Purchase, PurchaseStatus},
        store::{
            Catalog, EntitlementStore, PurchaseStore, StoreResult, TransactionStore, WebhookStore,
        },
        transaction::{NewTransaction, Transaction, TransactionStatus},
        webhook::{NewWebhookEvent, WebhookEvent},
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

/// All stores over one connection pool. Every write is a single-row
/// statement keyed by id, except the entitlement batch.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl PurchaseStore for PgStore {
    fn insert_purchase<'a>(&'a self, purchase: &'a NewPurchase) -> StoreResult<'a, Purchase> {
        Box::pin(purchase_repo::insert(&self.pool, purchase))
    }

    fn get_purchase(&self, id: Uuid) -> StoreResult<'_, Option<Purchase>> {
        Box::pin(purchase_repo::get(&self.pool, id))
    }

    fn update_purchase_status(
        &self,
        id: Uuid,
        status: PurchaseStatus,
    ) -> StoreResult<'_, Purchase> {
        Box::pin(purchase_repo::update_status(&self.pool, id, status))
    }

    fn update_purchase_reference<'a>(
        &'a self,
        id: Uuid,
        reference: &'a Reference,
    ) -> StoreResult<'a, ()> {
        Box::pin(purchase_repo::update_reference(&self.pool, id, reference))
    }

    fn list_pending_purchases(
        &self,
        created_before: DateTime<Utc>,
    ) -> StoreResult<'_, Vec<Purchase>> {
        Box::pin(purchase_repo::list_pending(&self.pool, created_before))
    }
}

impl TransactionStore for PgStore {
    fn insert_transaction<'a>(
        &'a self,
        transaction: &'a NewTransaction,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(transaction_repo::insert(&self.pool, transaction))
    }

    fn get_transaction(&self, id: Uuid) -> StoreResult<'_, Option<Transaction>> {
        Box::pin(transaction_repo::get(&self.pool, id))
    }

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Option<Transaction>> {
        Box::pin(transaction_repo::find_by_external_id(&self.pool, external_id))
    }

    fn find_unassigned_by_payment_link<'a>(
        &'a self,
        payment_link_id: &'a str,
    ) -> StoreResult<'a, Option<Transaction>> {
        Box::pin(transaction_repo::find_unassigned_by_payment_link(
            &self.pool,
            payment_link_id,
        ))
    }

    fn assign_external_id<'a>(
        &'a self,
        id: Uuid,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(transaction_repo::assign_external_id(
            &self.pool,
            id,
            external_id,
        ))
    }

    fn update_transaction_status<'a>(
        &'a self,
        id: Uuid,
        status: TransactionStatus,
        raw_response: &'a serde_json::Value,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(transaction_repo::update_status(
            &self.pool,
            id,
            status,
            raw_response,
        ))
    }
}

impl WebhookStore for PgStore {
    fn insert_webhook<'a>(&'a self, event: &'a NewWebhookEvent) -> StoreResult<'a, WebhookEvent> {
        Box::pin(webhook_repo::insert(&self.pool, event))
    }

    fn get_webhook(&self, id: Uuid) -> StoreResult<'_, Option<WebhookEvent>> {
        Box::pin(webhook_repo::get(&self.pool, id))
    }

    fn find_orphans<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Vec<WebhookEvent>> {
        Box::pin(webhook_repo::find_orphans(&self.pool, external_id))
    }

    fn link_webhook(&self, id: Uuid, transaction_id: Uuid) -> StoreResult<'_, ()> {
        Box::pin(webhook_repo::link(&self.pool, id, transaction_id))
    }

    fn mark_processed(&self, id: Uuid) -> StoreResult<'_, ()> {
        Box::pin(webhook_repo::mark_processed(&self.pool, id))
    }

    fn mark_failed<'a>(&'a self, id: Uuid, error: &'a str) -> StoreResult<'a, ()> {
        Box::pin(webhook_repo::mark_failed(&self.pool, id, error))
    }

    fn delete_orphans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<'_, u64> {
        Box::pin(webhook_repo::delete_orphans_before(&self.pool, cutoff))
    }
}

impl EntitlementStore for PgStore {
    fn has_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, bool> {
        Box::pin(entitlement_repo::exists_for_purchase(&self.pool, purchase_id))
    }

    fn insert_entitlements<'a>(
        &'a self,
        entitlements: &'a [NewEntitlement],
    ) -> StoreResult<'a, u64> {
        Box::pin(entitlement_repo::insert_many(&self.pool, entitlements))
    }

    fn list_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, Vec<Entitlement>> {
        Box::pin(entitlement_repo::list_for_purchase(&self.pool, purchase_id))
    }
}

impl Catalog for PgStore {
    fn get_package(&self, id: Uuid) -> StoreResult<'_, Option<Package>> {
        Box::pin(catalog_repo::get_package(&self.pool, id))
    }

    fn get_service(&self, id: Uuid) -> StoreResult<'_, Option<Service>> {
        Box::pin(catalog_repo::get_service(&self.pool, id))
    }
}

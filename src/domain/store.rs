//! Persistence contracts. Postgres and in-memory adapters live under `infra`.

use {
    super::{
        BoxFuture,
        catalog::{Package, Service},
        entitlement::{Entitlement, NewEntitlement},
        error::PaymentError,
        id::{ExternalId, Reference},
        purchase::{NewPurchase, Purchase, PurchaseStatus},
        transaction::{NewTransaction, Transaction, TransactionStatus},
        webhook::{NewWebhookEvent, WebhookEvent},
    },
    chrono::{DateTime, Utc},
    uuid::Uuid,
};

pub type StoreResult<'a, T> = BoxFuture<'a, Result<T, PaymentError>>;

pub trait PurchaseStore: Send + Sync {
    fn insert_purchase<'a>(&'a self, purchase: &'a NewPurchase) -> StoreResult<'a, Purchase>;

    fn get_purchase(&self, id: Uuid) -> StoreResult<'_, Option<Purchase>>;

    /// Returns the updated row, or `NotFound`.
    fn update_purchase_status(
        &self,
        id: Uuid,
        status: PurchaseStatus,
    ) -> StoreResult<'_, Purchase>;

    fn update_purchase_reference<'a>(
        &'a self,
        id: Uuid,
        reference: &'a Reference,
    ) -> StoreResult<'a, ()>;

    /// Purchases still `pending` that were created before `created_before`.
    fn list_pending_purchases(
        &self,
        created_before: DateTime<Utc>,
    ) -> StoreResult<'_, Vec<Purchase>>;
}

pub trait TransactionStore: Send + Sync {
    /// Fails if the external id is already taken.
    fn insert_transaction<'a>(
        &'a self,
        transaction: &'a NewTransaction,
    ) -> StoreResult<'a, Transaction>;

    fn get_transaction(&self, id: Uuid) -> StoreResult<'_, Option<Transaction>>;

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Option<Transaction>>;

    /// A payment-link transaction whose external id has not been assigned yet.
    fn find_unassigned_by_payment_link<'a>(
        &'a self,
        payment_link_id: &'a str,
    ) -> StoreResult<'a, Option<Transaction>>;

    /// Sets the external id if it is still unset. An external id, once
    /// assigned, never changes.
    fn assign_external_id<'a>(
        &'a self,
        id: Uuid,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Transaction>;

    fn update_transaction_status<'a>(
        &'a self,
        id: Uuid,
        status: TransactionStatus,
        raw_response: &'a serde_json::Value,
    ) -> StoreResult<'a, Transaction>;
}

pub trait WebhookStore: Send + Sync {
    fn insert_webhook<'a>(&'a self, event: &'a NewWebhookEvent) -> StoreResult<'a, WebhookEvent>;

    fn get_webhook(&self, id: Uuid) -> StoreResult<'_, Option<WebhookEvent>>;

    /// Unlinked events for `external_id`, oldest received first.
    fn find_orphans<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Vec<WebhookEvent>>;

    /// Links the event to a transaction and moves it to `processing`.
    fn link_webhook(&self, id: Uuid, transaction_id: Uuid) -> StoreResult<'_, ()>;

    fn mark_processed(&self, id: Uuid) -> StoreResult<'_, ()>;

    fn mark_failed<'a>(&'a self, id: Uuid, error: &'a str) -> StoreResult<'a, ()>;

    /// Deletes unlinked events received before `cutoff`. Returns the count.
    fn delete_orphans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<'_, u64>;
}

pub trait EntitlementStore: Send + Sync {
    fn has_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, bool>;

    /// Returns the number of rows actually inserted.
    fn insert_entitlements<'a>(
        &'a self,
        entitlements: &'a [NewEntitlement],
    ) -> StoreResult<'a, u64>;

    fn list_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, Vec<Entitlement>>;
}

/// Read-only view of the package/service catalog.
pub trait Catalog: Send + Sync {
    fn get_package(&self, id: Uuid) -> StoreResult<'_, Option<Package>>;

    fn get_service(&self, id: Uuid) -> StoreResult<'_, Option<Service>>;
}

//! In-process store backing every persistence contract, for tests.

use {
    crate::domain::{
        catalog::{Package, Service},
        entitlement::{Entitlement, EntitlementStatus, NewEntitlement},
        error::PaymentError,
        id::{ExternalId, Reference},
        purchase::{NewPurchase, Purchase, PurchaseStatus},
        store::{
            Catalog, EntitlementStore, PurchaseStore, StoreResult, TransactionStore, WebhookStore,
        },
        transaction::{NewTransaction, Transaction, TransactionStatus},
        webhook::{NewWebhookEvent, WebhookEvent, WebhookStatus},
    },
    chrono::{DateTime, Utc},
    std::collections::HashMap,
    tokio::sync::Mutex,
    uuid::Uuid,
};

#[derive(Default)]
struct State {
    purchases: HashMap<Uuid, Purchase>,
    transactions: HashMap<Uuid, Transaction>,
    // Insertion order doubles as arrival order.
    webhooks: Vec<WebhookEvent>,
    entitlements: Vec<Entitlement>,
    packages: HashMap<Uuid, Package>,
    services: HashMap<Uuid, Service>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_package(&self, package: Package) {
        self.state.lock().await.packages.insert(package.id, package);
    }

    pub async fn add_service(&self, service: Service) {
        self.state.lock().await.services.insert(service.id, service);
    }

    pub async fn remove_service(&self, id: Uuid) -> Option<Service> {
        self.state.lock().await.services.remove(&id)
    }

    pub async fn webhooks(&self) -> Vec<WebhookEvent> {
        self.state.lock().await.webhooks.clone()
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        let state = self.state.lock().await;
        let mut all: Vec<_> = state.transactions.values().cloned().collect();
        all.sort_by_key(|t| t.id);
        all
    }

    pub async fn purchases(&self) -> Vec<Purchase> {
        let state = self.state.lock().await;
        let mut all: Vec<_> = state.purchases.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        all
    }

    pub async fn entitlement_count(&self) -> usize {
        self.state.lock().await.entitlements.len()
    }

    /// Backdates a webhook's arrival time, for retention tests.
    pub async fn set_webhook_received_at(&self, id: Uuid, received_at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        if let Some(event) = state.webhooks.iter_mut().find(|w| w.id == id) {
            event.received_at = received_at;
        }
    }
}

fn not_found(what: &str, id: Uuid) -> PaymentError {
    PaymentError::NotFound(format!("{what} {id}"))
}

impl PurchaseStore for MemoryStore {
    fn insert_purchase<'a>(&'a self, purchase: &'a NewPurchase) -> StoreResult<'a, Purchase> {
        Box::pin(async move {
            let now = Utc::now();
            let row = Purchase {
                id: purchase.id,
                payer_id: purchase.payer_id,
                target: purchase.target,
                money: purchase.money,
                status: PurchaseStatus::Pending,
                reference: purchase.reference.as_str().to_string(),
                expires_at: purchase.expires_at,
                payment_details: purchase.payment_details.clone(),
                created_at: now,
                updated_at: now,
            };
            self.state
                .lock()
                .await
                .purchases
                .insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn get_purchase(&self, id: Uuid) -> StoreResult<'_, Option<Purchase>> {
        Box::pin(async move { Ok(self.state.lock().await.purchases.get(&id).cloned()) })
    }

    fn update_purchase_status(
        &self,
        id: Uuid,
        status: PurchaseStatus,
    ) -> StoreResult<'_, Purchase> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .purchases
                .get_mut(&id)
                .ok_or_else(|| not_found("purchase", id))?;
            row.status = status;
            row.updated_at = Utc::now();
            Ok(row.clone())
        })
    }

    fn update_purchase_reference<'a>(
        &'a self,
        id: Uuid,
        reference: &'a Reference,
    ) -> StoreResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .purchases
                .get_mut(&id)
                .ok_or_else(|| not_found("purchase", id))?;
            row.reference = reference.as_str().to_string();
            row.updated_at = Utc::now();
            Ok(())
        })
    }

    fn list_pending_purchases(
        &self,
        created_before: DateTime<Utc>,
    ) -> StoreResult<'_, Vec<Purchase>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut rows: Vec<_> = state
                .purchases
                .values()
                .filter(|p| p.status == PurchaseStatus::Pending && p.created_at < created_before)
                .cloned()
                .collect();
            rows.sort_by_key(|p| p.created_at);
            Ok(rows)
        })
    }
}

impl TransactionStore for MemoryStore {
    fn insert_transaction<'a>(
        &'a self,
        transaction: &'a NewTransaction,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if let Some(external_id) = &transaction.external_id {
                let taken = state
                    .transactions
                    .values()
                    .any(|t| t.external_id.as_ref() == Some(external_id));
                if taken {
                    return Err(PaymentError::Validation(format!(
                        "external id {external_id} already assigned"
                    )));
                }
            }
            let now = Utc::now();
            let row = Transaction {
                id: transaction.id,
                purchase_id: transaction.purchase_id,
                external_id: transaction.external_id.clone(),
                payment_link_id: transaction.payment_link_id.clone(),
                reference: transaction.reference.as_str().to_string(),
                money: transaction.money,
                status: transaction.status,
                raw_response: transaction.raw_response.clone(),
                created_at: now,
                updated_at: now,
            };
            state.transactions.insert(row.id, row.clone());
            Ok(row)
        })
    }

    fn get_transaction(&self, id: Uuid) -> StoreResult<'_, Option<Transaction>> {
        Box::pin(async move { Ok(self.state.lock().await.transactions.get(&id).cloned()) })
    }

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Option<Transaction>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .transactions
                .values()
                .find(|t| t.external_id.as_ref() == Some(external_id))
                .cloned())
        })
    }

    fn find_unassigned_by_payment_link<'a>(
        &'a self,
        payment_link_id: &'a str,
    ) -> StoreResult<'a, Option<Transaction>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .transactions
                .values()
                .filter(|t| {
                    t.external_id.is_none() && t.payment_link_id.as_deref() == Some(payment_link_id)
                })
                .min_by_key(|t| t.created_at)
                .cloned())
        })
    }

    fn assign_external_id<'a>(
        &'a self,
        id: Uuid,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let taken_elsewhere = state
                .transactions
                .values()
                .any(|t| t.id != id && t.external_id.as_ref() == Some(external_id));
            if taken_elsewhere {
                return Err(PaymentError::Validation(format!(
                    "external id {external_id} already assigned"
                )));
            }
            let row = state
                .transactions
                .get_mut(&id)
                .ok_or_else(|| not_found("transaction", id))?;
            match row.external_id.clone() {
                None => {
                    row.external_id = Some(external_id.clone());
                    row.updated_at = Utc::now();
                }
                Some(existing) if &existing == external_id => {}
                Some(existing) => {
                    return Err(PaymentError::Reconciliation(format!(
                        "transaction {id} already has external id {existing}"
                    )));
                }
            }
            Ok(row.clone())
        })
    }

    fn update_transaction_status<'a>(
        &'a self,
        id: Uuid,
        status: TransactionStatus,
        raw_response: &'a serde_json::Value,
    ) -> StoreResult<'a, Transaction> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .transactions
                .get_mut(&id)
                .ok_or_else(|| not_found("transaction", id))?;
            row.status = status;
            row.raw_response = raw_response.clone();
            row.updated_at = Utc::now();
            Ok(row.clone())
        })
    }
}

impl WebhookStore for MemoryStore {
    fn insert_webhook<'a>(&'a self, event: &'a NewWebhookEvent) -> StoreResult<'a, WebhookEvent> {
        Box::pin(async move {
            let row = WebhookEvent {
                id: event.id,
                transaction_id: event.transaction_id,
                provider: event.provider.clone(),
                event_type: event.event_type.clone(),
                external_id: event.external_id.clone(),
                payment_link_id: event.payment_link_id.clone(),
                payload: event.payload.clone(),
                checksum: event.checksum.clone(),
                status: event.status,
                received_at: Utc::now(),
                processed_at: None,
                error_message: None,
                note: event.note.clone(),
            };
            self.state.lock().await.webhooks.push(row.clone());
            Ok(row)
        })
    }

    fn get_webhook(&self, id: Uuid) -> StoreResult<'_, Option<WebhookEvent>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.webhooks.iter().find(|w| w.id == id).cloned())
        })
    }

    fn find_orphans<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreResult<'a, Vec<WebhookEvent>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut rows: Vec<_> = state
                .webhooks
                .iter()
                .filter(|w| w.is_orphaned() && &w.external_id == external_id)
                .cloned()
                .collect();
            // Stable sort keeps insertion order for equal timestamps.
            rows.sort_by_key(|w| w.received_at);
            Ok(rows)
        })
    }

    fn link_webhook(&self, id: Uuid, transaction_id: Uuid) -> StoreResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .webhooks
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| not_found("webhook", id))?;
            row.transaction_id = Some(transaction_id);
            row.status = WebhookStatus::Processing;
            Ok(())
        })
    }

    fn mark_processed(&self, id: Uuid) -> StoreResult<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .webhooks
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| not_found("webhook", id))?;
            row.status = WebhookStatus::Processed;
            row.processed_at = Some(Utc::now());
            row.error_message = None;
            Ok(())
        })
    }

    fn mark_failed<'a>(&'a self, id: Uuid, error: &'a str) -> StoreResult<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let row = state
                .webhooks
                .iter_mut()
                .find(|w| w.id == id)
                .ok_or_else(|| not_found("webhook", id))?;
            row.status = WebhookStatus::Failed;
            row.processed_at = Some(Utc::now());
            row.error_message = Some(error.to_string());
            Ok(())
        })
    }

    fn delete_orphans_before(&self, cutoff: DateTime<Utc>) -> StoreResult<'_, u64> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let before = state.webhooks.len();
            state
                .webhooks
                .retain(|w| !(w.is_orphaned() && w.received_at < cutoff));
            Ok((before - state.webhooks.len()) as u64)
        })
    }
}

impl EntitlementStore for MemoryStore {
    fn has_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, bool> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .entitlements
                .iter()
                .any(|e| e.purchase_id == purchase_id))
        })
    }

    fn insert_entitlements<'a>(
        &'a self,
        entitlements: &'a [NewEntitlement],
    ) -> StoreResult<'a, u64> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let now = Utc::now();
            let mut inserted = 0;
            for new in entitlements {
                let exists = state
                    .entitlements
                    .iter()
                    .any(|e| e.purchase_id == new.purchase_id && e.service_id == new.service_id);
                if exists {
                    continue;
                }
                state.entitlements.push(Entitlement {
                    id: new.id,
                    purchase_id: new.purchase_id,
                    service_id: new.service_id,
                    remaining: new.remaining,
                    expires_at: new.expires_at,
                    status: EntitlementStatus::Active,
                    created_at: now,
                });
                inserted += 1;
            }
            Ok(inserted)
        })
    }

    fn list_entitlements(&self, purchase_id: Uuid) -> StoreResult<'_, Vec<Entitlement>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .entitlements
                .iter()
                .filter(|e| e.purchase_id == purchase_id)
                .cloned()
                .collect())
        })
    }
}

impl Catalog for MemoryStore {
    fn get_package(&self, id: Uuid) -> StoreResult<'_, Option<Package>> {
        Box::pin(async move { Ok(self.state.lock().await.packages.get(&id).cloned()) })
    }

    fn get_service(&self, id: Uuid) -> StoreResult<'_, Option<Service>> {
        Box::pin(async move { Ok(self.state.lock().await.services.get(&id).cloned()) })
    }
}

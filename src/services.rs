pub mod entitlements;
pub mod orchestrator;
pub mod reconciler;
pub mod worker;

use {
    crate::domain::store::{Catalog, EntitlementStore, PurchaseStore, TransactionStore, WebhookStore},
    std::sync::Arc,
};

/// The persistence collaborators shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub purchases: Arc<dyn PurchaseStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub webhooks: Arc<dyn WebhookStore>,
    pub entitlements: Arc<dyn EntitlementStore>,
    pub catalog: Arc<dyn Catalog>,
}

impl Stores {
    /// All five contracts served by one backing store.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: PurchaseStore + TransactionStore + WebhookStore + EntitlementStore + Catalog + 'static,
    {
        Self {
            purchases: store.clone(),
            transactions: store.clone(),
            webhooks: store.clone(),
            entitlements: store.clone(),
            catalog: store,
        }
    }
}

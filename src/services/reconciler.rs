use {
    crate::{
        adapters::webhook_signature::WebhookVerifier,
        domain::{
            error::PaymentError,
            gateway::GatewayStatus,
            purchase::{Purchase, PurchaseStatus},
            store::{PurchaseStore, TransactionStore, WebhookStore},
            transaction::{Transaction, TransactionStatus},
            webhook::{
                GatewayEventKind, NewWebhookEvent, TransactionUpdate, WebhookEnvelope,
                WebhookEvent, WebhookStatus,
            },
        },
        services::{
            Stores,
            entitlements::{EntitlementGranter, GrantOutcome},
        },
    },
    chrono::{DateTime, Duration, Utc},
    serde::Serialize,
    std::sync::Arc,
    uuid::Uuid,
};

/// What happened to one delivery. Everything here is acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    Processed,
    Orphaned,
    /// Stored and linked, but applying it failed. The error is on the row.
    Failed,
    /// A kind this service does not act on. Not stored.
    Ignored,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub linked: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Result of driving a transaction to a gateway-reported status.
#[derive(Debug, Clone)]
pub struct Applied {
    pub transaction: Transaction,
    pub purchase: Purchase,
    pub grant: Option<GrantOutcome>,
}

pub struct WebhookReconciler {
    verifier: WebhookVerifier,
    webhooks: Arc<dyn WebhookStore>,
    transactions: Arc<dyn TransactionStore>,
    purchases: Arc<dyn PurchaseStore>,
    granter: EntitlementGranter,
    orphan_retention: Duration,
}

impl WebhookReconciler {
    pub fn new(verifier: WebhookVerifier, stores: &Stores, orphan_retention: Duration) -> Self {
        Self {
            verifier,
            webhooks: stores.webhooks.clone(),
            transactions: stores.transactions.clone(),
            purchases: stores.purchases.clone(),
            granter: EntitlementGranter::new(stores.entitlements.clone(), stores.catalog.clone()),
            orphan_retention,
        }
    }

    /// Verify, resolve, persist and apply one gateway notification.
    ///
    /// Errors are returned only for deliveries that must not be stored
    /// (malformed or unauthentic) and for store failures while recording the
    /// outcome, which the gateway should retry.
    pub async fn ingest(
        &self,
        body: &[u8],
        checksum_header: Option<&str>,
    ) -> Result<IngestOutcome, PaymentError> {
        let envelope = WebhookEnvelope::parse(body)?;
        let checksum = self.verifier.verify(&envelope, checksum_header)?;

        match envelope.kind() {
            GatewayEventKind::TransactionUpdated => {}
            kind @ (GatewayEventKind::NequiTokenUpdated
            | GatewayEventKind::BancolombiaTransferTokenUpdated) => {
                tracing::info!(event = %kind, "payment source token event acknowledged");
                return Ok(IngestOutcome::Ignored);
            }
            GatewayEventKind::Other(kind) => {
                tracing::warn!(event = %kind, "unknown event kind acknowledged");
                return Ok(IngestOutcome::Ignored);
            }
        }

        let update = TransactionUpdate::from_data(&envelope.data)?;
        let payload: serde_json::Value = serde_json::from_slice(body)?;

        let Some(transaction) = self.resolve(&update).await? else {
            let orphan = NewWebhookEvent::orphaned(&envelope.event, &update, payload, checksum);
            let stored = self.webhooks.insert_webhook(&orphan).await?;

            // The transaction may have been created, and its backfill run,
            // between the lookup above and this insert.
            if let Some(transaction) = self.resolve(&update).await? {
                tracing::info!(
                    webhook_id = %stored.id,
                    transaction_id = %transaction.id,
                    "transaction appeared while storing orphan, backfilling"
                );
                let report = self.backfill(&transaction).await?;
                return Ok(match report.failed {
                    0 => IngestOutcome::Processed,
                    _ => IngestOutcome::Failed,
                });
            }

            tracing::info!(
                webhook_id = %stored.id,
                external_id = %update.external_id,
                status = %update.status,
                "no local transaction yet, stored as orphan"
            );
            return Ok(IngestOutcome::Orphaned);
        };

        let event = NewWebhookEvent::linked(
            transaction.id,
            &envelope.event,
            &update,
            payload,
            checksum,
        );
        let stored = self.webhooks.insert_webhook(&event).await?;

        self.process(stored.id, &transaction, &update.status, &stored.payload)
            .await
    }

    /// Replays orphaned events for a freshly persisted transaction, oldest
    /// first. One failed event does not stop the rest.
    pub async fn backfill(&self, transaction: &Transaction) -> Result<BackfillReport, PaymentError> {
        let mut report = BackfillReport::default();
        let Some(external_id) = &transaction.external_id else {
            return Ok(report);
        };

        let orphans = self.webhooks.find_orphans(external_id).await?;
        let mut current = transaction.clone();

        for orphan in orphans {
            match self.backfill_one(&current, &orphan).await {
                Ok(Some(applied)) => {
                    report.linked += 1;
                    report.processed += 1;
                    current = applied.transaction;
                }
                Ok(None) => {
                    report.linked += 1;
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::error!(
                        webhook_id = %orphan.id,
                        external_id = %external_id,
                        error = %e,
                        "backfill could not record event"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.linked > 0 {
            tracing::info!(
                external_id = %external_id,
                linked = report.linked,
                processed = report.processed,
                failed = report.failed,
                "orphan backfill finished"
            );
        }

        Ok(report)
    }

    /// Moves a transaction and its purchase to the internal status mapped
    /// from `status`, then grants entitlements if the purchase is completed.
    /// A settled transaction is never moved back to an earlier stage.
    pub async fn apply_status(
        &self,
        transaction: &Transaction,
        status: &GatewayStatus,
        snapshot: &serde_json::Value,
    ) -> Result<Applied, PaymentError> {
        let next = TransactionStatus::from_gateway(status);

        let (transaction, purchase) = if transaction.status.would_regress_to(next) {
            tracing::warn!(
                transaction_id = %transaction.id,
                from = %transaction.status,
                to = %next,
                "late status would regress transaction, ignored as anomaly"
            );
            let purchase = self.load_purchase(transaction.purchase_id).await?;
            (transaction.clone(), purchase)
        } else {
            let updated = self
                .transactions
                .update_transaction_status(transaction.id, next, snapshot)
                .await?;
            let purchase = self
                .purchases
                .update_purchase_status(transaction.purchase_id, PurchaseStatus::from(next))
                .await?;
            (updated, purchase)
        };

        let grant = match purchase.status {
            PurchaseStatus::Completed => Some(self.granter.grant(&purchase).await?),
            _ => None,
        };

        Ok(Applied {
            transaction,
            purchase,
            grant,
        })
    }

    /// Deletes orphans older than the retention window.
    pub async fn sweep_orphans(&self, now: DateTime<Utc>) -> Result<u64, PaymentError> {
        self.webhooks
            .delete_orphans_before(now - self.orphan_retention)
            .await
    }

    /// Operator-triggered retry of a single stored event.
    pub async fn replay(&self, webhook_id: Uuid) -> Result<IngestOutcome, PaymentError> {
        let event = self
            .webhooks
            .get_webhook(webhook_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("webhook {webhook_id}")))?;

        let transaction = match event.transaction_id {
            Some(_) if event.status == WebhookStatus::Processed => {
                return Ok(IngestOutcome::Processed);
            }
            Some(transaction_id) => self
                .transactions
                .get_transaction(transaction_id)
                .await?
                .ok_or_else(|| PaymentError::NotFound(format!("transaction {transaction_id}")))?,
            None => {
                let update = TransactionUpdate::from_payload(&event.payload)?;
                let Some(transaction) = self.resolve(&update).await? else {
                    return Ok(IngestOutcome::Orphaned);
                };
                self.webhooks.link_webhook(event.id, transaction.id).await?;
                transaction
            }
        };

        tracing::info!(webhook_id = %event.id, transaction_id = %transaction.id, "replaying event");
        let update = match TransactionUpdate::from_payload(&event.payload) {
            Ok(update) => update,
            Err(e) => {
                self.webhooks.mark_failed(event.id, &e.to_string()).await?;
                return Ok(IngestOutcome::Failed);
            }
        };
        self.process(event.id, &transaction, &update.status, &event.payload)
            .await
    }

    /// Finds the local transaction for an update: by external id, else by a
    /// payment link still waiting for its first transaction.
    async fn resolve(&self, update: &TransactionUpdate) -> Result<Option<Transaction>, PaymentError> {
        if let Some(found) = self
            .transactions
            .find_by_external_id(&update.external_id)
            .await?
        {
            return Ok(Some(found));
        }

        let Some(link_id) = &update.payment_link_id else {
            return Ok(None);
        };
        let Some(pending) = self.transactions.find_unassigned_by_payment_link(link_id).await? else {
            return Ok(None);
        };

        let assigned = self
            .transactions
            .assign_external_id(pending.id, &update.external_id)
            .await?;
        tracing::info!(
            transaction_id = %assigned.id,
            payment_link_id = %link_id,
            external_id = %update.external_id,
            "payment link transaction assigned its external id"
        );
        Ok(Some(assigned))
    }

    async fn process(
        &self,
        webhook_id: Uuid,
        transaction: &Transaction,
        status: &GatewayStatus,
        payload: &serde_json::Value,
    ) -> Result<IngestOutcome, PaymentError> {
        match self.apply_status(transaction, status, payload).await {
            Ok(applied) => {
                self.webhooks.mark_processed(webhook_id).await?;
                tracing::info!(
                    webhook_id = %webhook_id,
                    transaction_id = %applied.transaction.id,
                    status = %applied.transaction.status,
                    purchase_status = %applied.purchase.status,
                    grant = ?applied.grant,
                    "webhook applied"
                );
                Ok(IngestOutcome::Processed)
            }
            Err(e) => {
                tracing::error!(webhook_id = %webhook_id, error = %e, "webhook apply failed");
                self.webhooks.mark_failed(webhook_id, &e.to_string()).await?;
                Ok(IngestOutcome::Failed)
            }
        }
    }

    /// Links and applies one orphan. `Ok(None)` means the apply failed and
    /// was recorded on the row; `Err` means the store itself failed.
    async fn backfill_one(
        &self,
        transaction: &Transaction,
        orphan: &WebhookEvent,
    ) -> Result<Option<Applied>, PaymentError> {
        self.webhooks.link_webhook(orphan.id, transaction.id).await?;

        match self.apply_payload(transaction, &orphan.payload).await {
            Ok(applied) => {
                self.webhooks.mark_processed(orphan.id).await?;
                Ok(Some(applied))
            }
            Err(e) => {
                tracing::warn!(
                    webhook_id = %orphan.id,
                    transaction_id = %transaction.id,
                    error = %e,
                    "backfilled event failed"
                );
                self.webhooks.mark_failed(orphan.id, &e.to_string()).await?;
                Ok(None)
            }
        }
    }

    async fn apply_payload(
        &self,
        transaction: &Transaction,
        payload: &serde_json::Value,
    ) -> Result<Applied, PaymentError> {
        let update = TransactionUpdate::from_payload(payload)?;
        self.apply_status(transaction, &update.status, payload).await
    }

    async fn load_purchase(&self, id: Uuid) -> Result<Purchase, PaymentError> {
        self.purchases
            .get_purchase(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("purchase {id}")))
    }
}

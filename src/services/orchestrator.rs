use {
    crate::{
        domain::{
            amount_policy::AmountPolicy,
            catalog::CatalogItem,
            error::PaymentError,
            gateway::{
                AcceptanceTokens, GatewayError, PaymentGateway, PaymentLinkDraft,
                TransactionDraft, VoidRequest,
            },
            id::{ExternalId, Reference},
            money::{Currency, Money, MoneyAmount},
            purchase::{NewPurchase, Purchase, PurchaseStatus, PurchaseTarget},
            store::{Catalog, PurchaseStore, TransactionStore},
            transaction::{NewTransaction, Transaction, TransactionStatus},
        },
        services::{
            Stores,
            reconciler::{Applied, WebhookReconciler},
        },
    },
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::{future::Future, sync::Arc, time::Duration},
    uuid::Uuid,
};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on a single gateway call.
    pub gateway_timeout: Duration,
    /// How long a new purchase stays payable.
    pub payment_window: chrono::Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransaction {
    pub payer_id: Uuid,
    pub target: PurchaseTarget,
    pub amount_in_cents: i64,
    pub currency: Currency,
    pub customer_email: String,
    /// Gateway payment-method object (`{"type": "NEQUI", ...}`), passed through.
    pub payment_method: serde_json::Value,
    #[serde(default)]
    pub acceptance: Option<AcceptanceTokens>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentLink {
    pub payer_id: Uuid,
    pub target: PurchaseTarget,
    pub amount_in_cents: i64,
    pub currency: Currency,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_single_use")]
    pub single_use: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

fn default_single_use() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionReceipt {
    pub purchase_id: Uuid,
    pub transaction_id: Uuid,
    pub external_id: Option<ExternalId>,
    pub status: TransactionStatus,
    pub purchase_status: PurchaseStatus,
    pub amount_in_cents: i64,
    pub currency: Currency,
    pub reference: String,
    /// Hosted checkout permalink, or the bank URL for redirect flows.
    pub redirect_url: Option<String>,
}

impl TransactionReceipt {
    fn new(
        transaction: &Transaction,
        purchase_status: PurchaseStatus,
        redirect_url: Option<String>,
    ) -> Self {
        Self {
            purchase_id: transaction.purchase_id,
            transaction_id: transaction.id,
            external_id: transaction.external_id.clone(),
            status: transaction.status,
            purchase_status,
            amount_in_cents: transaction.money.amount().minor_units(),
            currency: transaction.money.currency(),
            reference: transaction.reference.clone(),
            redirect_url,
        }
    }

    fn from_applied(applied: &Applied, redirect_url: Option<String>) -> Self {
        Self::new(&applied.transaction, applied.purchase.status, redirect_url)
    }
}

pub struct TransactionOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    policy: AmountPolicy,
    catalog: Arc<dyn Catalog>,
    purchases: Arc<dyn PurchaseStore>,
    transactions: Arc<dyn TransactionStore>,
    reconciler: Arc<WebhookReconciler>,
    settings: OrchestratorSettings,
}

impl TransactionOrchestrator {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        policy: AmountPolicy,
        stores: &Stores,
        reconciler: Arc<WebhookReconciler>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            gateway,
            policy,
            catalog: stores.catalog.clone(),
            purchases: stores.purchases.clone(),
            transactions: stores.transactions.clone(),
            reconciler,
            settings,
        }
    }

    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<TransactionReceipt, PaymentError> {
        let money = self.checked_money(request.amount_in_cents, request.currency)?;
        self.load_item(request.target).await?;
        let acceptance = self
            .resolve_acceptance(request.acceptance, &request.payment_method)
            .await?;

        let details = serde_json::json!({
            "customer_email": request.customer_email,
            "payment_method_type": request.payment_method.get("type"),
        });
        let (purchase, reference) = self
            .open_purchase(request.payer_id, request.target, money, None, details)
            .await?;

        let draft = TransactionDraft {
            money,
            customer_email: request.customer_email,
            payment_method: request.payment_method,
            acceptance,
            redirect_url: request.redirect_url,
        };
        let gateway = &*self.gateway;
        let (created, reference) = self
            .submit_with_retry(purchase.id, reference, |reference| {
                let attempt = draft.attempt(reference);
                async move { gateway.create_transaction(&attempt).await }
            })
            .await?;

        let status = TransactionStatus::from_gateway(&created.status);
        let transaction = self
            .transactions
            .insert_transaction(
                &NewTransaction::new(purchase.id, reference, money, status, created.raw.clone())
                    .with_external_id(created.id.clone()),
            )
            .await?;

        tracing::info!(
            purchase_id = %purchase.id,
            external_id = %created.id,
            status = %transaction.status,
            "gateway transaction created"
        );

        // A settled first response cascades like any later update would.
        let mut current = transaction;
        let mut purchase_status = purchase.status;
        if current.status != TransactionStatus::Pending {
            match self
                .reconciler
                .apply_status(&current, &created.status, &created.raw)
                .await
            {
                Ok(applied) => {
                    purchase_status = applied.purchase.status;
                    current = applied.transaction;
                }
                Err(e) => tracing::error!(
                    transaction_id = %current.id,
                    error = %e,
                    "applying initial gateway status failed"
                ),
            }
        }

        match self.reconciler.backfill(&current).await {
            Ok(report) if report.processed > 0 => {
                if let Some(fresh) = self.transactions.get_transaction(current.id).await? {
                    current = fresh;
                }
                if let Some(fresh) = self.purchases.get_purchase(purchase.id).await? {
                    purchase_status = fresh.status;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    transaction_id = %current.id,
                    error = %e,
                    "orphan backfill failed, events stay for replay"
                );
            }
        }

        Ok(TransactionReceipt::new(
            &current,
            purchase_status,
            created.redirect_url,
        ))
    }

    pub async fn create_payment_link(
        &self,
        request: CreatePaymentLink,
    ) -> Result<TransactionReceipt, PaymentError> {
        let money = self.checked_money(request.amount_in_cents, request.currency)?;
        let item = self.load_item(request.target).await?;

        let (purchase, reference) = self
            .open_purchase(
                request.payer_id,
                request.target,
                money,
                request.expires_at,
                serde_json::json!({ "flow": "payment_link" }),
            )
            .await?;

        let draft = PaymentLinkDraft {
            name: item.name().to_string(),
            description: request
                .description
                .unwrap_or_else(|| item.name().to_string()),
            money,
            single_use: request.single_use,
            expires_at: request.expires_at,
            redirect_url: request.redirect_url,
        };
        let gateway = &*self.gateway;
        let (link, reference) = self
            .submit_with_retry(purchase.id, reference, |reference| {
                let attempt = draft.attempt(reference);
                async move { gateway.create_payment_link(&attempt).await }
            })
            .await?;

        // The external id arrives with the first webhook for this link.
        let transaction = self
            .transactions
            .insert_transaction(
                &NewTransaction::new(
                    purchase.id,
                    reference,
                    money,
                    TransactionStatus::Pending,
                    link.raw.clone(),
                )
                .with_payment_link(link.id.clone()),
            )
            .await?;

        tracing::info!(
            purchase_id = %purchase.id,
            payment_link_id = %link.id,
            "payment link created"
        );

        Ok(TransactionReceipt::new(
            &transaction,
            purchase.status,
            Some(link.permalink),
        ))
    }

    /// Polls the gateway and applies what it reports.
    pub async fn refresh_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<TransactionReceipt, PaymentError> {
        let transaction = self.find_transaction(external_id).await?;
        let remote = self
            .bounded(self.gateway.get_transaction(external_id))
            .await?;
        let applied = self
            .reconciler
            .apply_status(&transaction, &remote.status, &remote.raw)
            .await?;
        Ok(TransactionReceipt::from_applied(&applied, remote.redirect_url))
    }

    pub async fn confirm_transaction(
        &self,
        external_id: &ExternalId,
        proof: &serde_json::Value,
    ) -> Result<TransactionReceipt, PaymentError> {
        let transaction = self.find_transaction(external_id).await?;
        let confirmed = self
            .bounded(self.gateway.confirm_transaction(external_id, proof))
            .await?;
        let applied = self
            .reconciler
            .apply_status(&transaction, &confirmed.status, &confirmed.raw)
            .await?;
        Ok(TransactionReceipt::from_applied(
            &applied,
            confirmed.redirect_url,
        ))
    }

    pub async fn void_transaction(
        &self,
        external_id: &ExternalId,
        amount: Option<MoneyAmount>,
        reason: Option<String>,
    ) -> Result<TransactionReceipt, PaymentError> {
        let transaction = self.find_transaction(external_id).await?;
        let request = VoidRequest {
            transaction_id: external_id.clone(),
            amount,
            reason,
        };
        let voided = self
            .bounded(self.gateway.void_transaction(&request))
            .await?;

        tracing::info!(external_id = %external_id, status = %voided.status, "transaction voided");
        let applied = self
            .reconciler
            .apply_status(&transaction, &voided.status, &voided.raw)
            .await?;
        Ok(TransactionReceipt::from_applied(&applied, None))
    }

    /// Purchases still pending after `older_than`.
    pub async fn pending_report(
        &self,
        older_than: chrono::Duration,
    ) -> Result<Vec<Purchase>, PaymentError> {
        self.purchases
            .list_pending_purchases(Utc::now() - older_than)
            .await
    }

    fn checked_money(&self, amount_in_cents: i64, currency: Currency) -> Result<Money, PaymentError> {
        let amount = MoneyAmount::new(amount_in_cents)?;
        self.policy.validate(amount, currency)?;
        Ok(Money::new(amount, currency))
    }

    /// Card and PSE payments need presigned acceptance. Fetch it when the
    /// caller did not pass one through.
    async fn resolve_acceptance(
        &self,
        given: Option<AcceptanceTokens>,
        payment_method: &serde_json::Value,
    ) -> Result<Option<AcceptanceTokens>, PaymentError> {
        if given.is_some() {
            return Ok(given);
        }
        let method = payment_method.get("type").and_then(|t| t.as_str());
        if !matches!(method, Some("CARD" | "PSE")) {
            return Ok(None);
        }
        let tokens = self.bounded(self.gateway.acceptance_tokens()).await?;
        Ok(Some(tokens))
    }

    async fn load_item(&self, target: PurchaseTarget) -> Result<CatalogItem, PaymentError> {
        let item = match target {
            PurchaseTarget::Package(id) => self
                .catalog
                .get_package(id)
                .await?
                .map(CatalogItem::Package),
            PurchaseTarget::Service(id) => self
                .catalog
                .get_service(id)
                .await?
                .map(CatalogItem::Service),
        };

        match item {
            Some(item) if item.is_active() => Ok(item),
            _ => Err(PaymentError::NotFound(format!("{target:?} is not available"))),
        }
    }

    async fn open_purchase(
        &self,
        payer_id: Uuid,
        target: PurchaseTarget,
        money: Money,
        expires_at: Option<DateTime<Utc>>,
        payment_details: serde_json::Value,
    ) -> Result<(Purchase, Reference), PaymentError> {
        let reference = Reference::generate();
        let expires_at = expires_at.unwrap_or_else(|| Utc::now() + self.settings.payment_window);
        let purchase = self
            .purchases
            .insert_purchase(&NewPurchase::pending(
                payer_id,
                target,
                money,
                reference.clone(),
                expires_at,
                payment_details,
            ))
            .await?;
        Ok((purchase, reference))
    }

    async fn find_transaction(&self, external_id: &ExternalId) -> Result<Transaction, PaymentError> {
        self.transactions
            .find_by_external_id(external_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("transaction {external_id}")))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.settings.gateway_timeout, call)
            .await
            .unwrap_or_else(|_| Err(GatewayError::Transient("gateway call timed out".into())))
    }

    /// Runs `call` once, and once more with a fresh reference if the gateway
    /// rejected the content. A second rejection fails the purchase.
    async fn submit_with_retry<T, F, Fut>(
        &self,
        purchase_id: Uuid,
        reference: Reference,
        call: F,
    ) -> Result<(T, Reference), PaymentError>
    where
        F: Fn(Reference) -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let rejection = match self.bounded(call(reference.clone())).await {
            Ok(value) => return Ok((value, reference)),
            Err(err @ GatewayError::Validation { .. }) => err,
            Err(err) => {
                tracing::warn!(purchase_id = %purchase_id, error = %err, "gateway call failed");
                return Err(err.into());
            }
        };

        let retry_reference = Reference::generate();
        tracing::warn!(
            purchase_id = %purchase_id,
            rejected = %reference,
            retry = %retry_reference,
            error = %rejection,
            "gateway rejected request, retrying once with a new reference"
        );
        self.purchases
            .update_purchase_reference(purchase_id, &retry_reference)
            .await?;

        match self.bounded(call(retry_reference.clone())).await {
            Ok(value) => Ok((value, retry_reference)),
            Err(err @ GatewayError::Validation { .. }) => {
                tracing::warn!(purchase_id = %purchase_id, error = %err, "retry rejected, purchase failed");
                self.purchases
                    .update_purchase_status(purchase_id, PurchaseStatus::Failed)
                    .await?;
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}

mod common;

use {
    clinic_payments::domain::{
        error::PaymentError,
        gateway::GatewayStatus,
        purchase::{PurchaseStatus, PurchaseTarget},
        store::{EntitlementStore, WebhookStore},
        transaction::TransactionStatus,
        webhook::{NewWebhookEvent, TransactionUpdate, WebhookStatus},
    },
    clinic_payments::services::reconciler::{BackfillReport, IngestOutcome},
    common::*,
};

// ── 1. in_order_delivery ───────────────────────────────────────────────────

#[tokio::test]
async fn in_order_delivery() {
    let h = harness().await;
    h.gateway.script([Reply::Accept {
        id: "E1",
        status: GatewayStatus::Pending,
    }]);

    let receipt = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Service(h.service_id), 50_000))
        .await
        .unwrap();
    assert_eq!(receipt.status, TransactionStatus::Pending);
    assert_eq!(receipt.purchase_status, PurchaseStatus::Pending);

    let tx = &h.store.transactions().await[0];
    assert_eq!(tx.external_id.as_ref().unwrap().as_str(), "E1");
    assert_eq!(tx.purchase_id, receipt.purchase_id);

    let outcome = h
        .reconciler
        .ingest(&transaction_event("E1", "APPROVED", 50_000), None)
        .await
        .unwrap();
    assert_eq!(outcome, IngestOutcome::Processed);

    assert_eq!(
        h.store.transactions().await[0].status,
        TransactionStatus::Completed
    );
    assert_eq!(
        h.store.purchases().await[0].status,
        PurchaseStatus::Completed
    );
    assert_eq!(h.store.entitlement_count().await, 1);
}

// ── 2. out_of_order_delivery ───────────────────────────────────────────────

#[tokio::test]
async fn out_of_order_delivery() {
    let h = harness().await;

    for status in ["PENDING", "APPROVED"] {
        let outcome = h
            .reconciler
            .ingest(&transaction_event("E2", status, 50_000), None)
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Orphaned);
    }
    assert!(h.store.webhooks().await.iter().all(|w| w.is_orphaned()));

    h.gateway.script([Reply::Accept {
        id: "E2",
        status: GatewayStatus::Pending,
    }]);
    let receipt = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Service(h.service_id), 50_000))
        .await
        .unwrap();

    assert_eq!(receipt.status, TransactionStatus::Completed);
    assert_eq!(receipt.purchase_status, PurchaseStatus::Completed);
    assert_eq!(h.store.entitlement_count().await, 1);

    let tx_id = receipt.transaction_id;
    let webhooks = h.store.webhooks().await;
    assert_eq!(webhooks.len(), 2);
    assert!(webhooks.iter().all(|w| w.transaction_id == Some(tx_id)));
    assert!(webhooks.iter().all(|w| w.status == WebhookStatus::Processed));
}

// ── 3. rejected_amount_never_reaches_gateway ───────────────────────────────

#[tokio::test]
async fn rejected_amount_never_reaches_gateway() {
    let h = harness().await;
    h.gateway.script([Reply::Accept {
        id: "E3",
        status: GatewayStatus::Pending,
    }]);

    let err = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Service(h.service_id), 50))
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::AmountRejected(_)));
    assert_eq!(h.gateway.calls(), 0);
    assert!(h.store.purchases().await.is_empty());
    assert!(h.store.transactions().await.is_empty());
}

// ── 4. package_purchase_grants_every_item ──────────────────────────────────

#[tokio::test]
async fn package_purchase_grants_every_item() {
    let h = harness().await;
    h.gateway.script([Reply::Accept {
        id: "E4",
        status: GatewayStatus::Pending,
    }]);
    let receipt = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Package(h.package_id), 20_000_000))
        .await
        .unwrap();

    h.reconciler
        .ingest(&transaction_event("E4", "APPROVED", 20_000_000), None)
        .await
        .unwrap();

    let granted = h.store.list_entitlements(receipt.purchase_id).await.unwrap();
    let mut sessions: Vec<i32> = granted.iter().map(|e| e.remaining).collect();
    sessions.sort();
    assert_eq!(sessions, vec![2, 4]);
    assert!(granted.iter().all(|e| e.expires_at > chrono::Utc::now() + chrono::Duration::days(89)));
}

// ── 5. backfill_follows_receipt_time_not_insert_order ──────────────────────

#[tokio::test]
async fn backfill_follows_receipt_time_not_insert_order() {
    let h = harness().await;

    for status in ["APPROVED", "DECLINED"] {
        h.reconciler
            .ingest(&transaction_event("E5", status, 50_000), None)
            .await
            .unwrap();
    }
    let now = chrono::Utc::now();
    for webhook in h.store.webhooks().await {
        let status = &webhook.payload["data"]["transaction"]["status"];
        let received_at = if status == "DECLINED" {
            now - chrono::Duration::seconds(10)
        } else {
            now - chrono::Duration::seconds(5)
        };
        h.store.set_webhook_received_at(webhook.id, received_at).await;
    }

    h.gateway.script([Reply::Accept {
        id: "E5",
        status: GatewayStatus::Pending,
    }]);
    let receipt = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Service(h.service_id), 50_000))
        .await
        .unwrap();

    // DECLINED was received first, so the later APPROVED decides.
    assert_eq!(receipt.status, TransactionStatus::Completed);
    assert_eq!(receipt.purchase_status, PurchaseStatus::Completed);
    assert_eq!(h.store.entitlement_count().await, 1);
}

// ── 6. failed_backfill_event_does_not_block_others ─────────────────────────

#[tokio::test]
async fn failed_backfill_event_does_not_block_others() {
    let h = harness().await;
    h.gateway.script([Reply::Accept {
        id: "E6",
        status: GatewayStatus::Pending,
    }]);
    let receipt = h
        .orchestrator
        .create_transaction(nequi_request(PurchaseTarget::Service(h.service_id), 50_000))
        .await
        .unwrap();
    let transaction = h.store.transactions().await.remove(0);

    let update =
        TransactionUpdate::from_data(&transaction_data("E6", "PENDING", 50_000)).unwrap();
    let payloads = [
        serde_json::from_slice(&transaction_event("E6", "PENDING", 50_000)).unwrap(),
        serde_json::json!({"data": {"transaction": {"id": "E6"}}}),
        serde_json::from_slice(&transaction_event("E6", "APPROVED", 50_000)).unwrap(),
    ];
    let now = chrono::Utc::now();
    let mut ids = Vec::new();
    for (i, payload) in payloads.into_iter().enumerate() {
        let orphan = NewWebhookEvent::orphaned("transaction.updated", &update, payload, None);
        let stored = h.store.insert_webhook(&orphan).await.unwrap();
        h.store
            .set_webhook_received_at(stored.id, now - chrono::Duration::seconds(30 - i as i64))
            .await;
        ids.push(stored.id);
    }

    let report = h.reconciler.backfill(&transaction).await.unwrap();
    assert_eq!(
        report,
        BackfillReport {
            linked: 3,
            processed: 2,
            failed: 1,
        }
    );

    let broken = h.store.get_webhook(ids[1]).await.unwrap().unwrap();
    assert_eq!(broken.status, WebhookStatus::Failed);
    assert!(broken.error_message.is_some());
    for id in [ids[0], ids[2]] {
        let event = h.store.get_webhook(id).await.unwrap().unwrap();
        assert_eq!(event.status, WebhookStatus::Processed);
        assert_eq!(event.transaction_id, Some(receipt.transaction_id));
    }
    assert_eq!(
        h.store.purchases().await[0].status,
        PurchaseStatus::Completed
    );
    assert_eq!(h.store.entitlement_count().await, 1);
}

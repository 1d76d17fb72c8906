use {
    crate::services::reconciler::WebhookReconciler,
    std::{sync::Arc, time::Duration},
    tokio::sync::watch,
};

/// Periodically delete orphaned webhook events past the retention window.
pub async fn run_orphan_sweeper(
    reconciler: Arc<WebhookReconciler>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "orphan sweeper started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("orphan sweeper shutting down");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match reconciler.sweep_orphans(chrono::Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "swept expired orphan webhooks"),
            Err(e) => tracing::error!(error = %e, "orphan sweep error"),
        }
    }
}

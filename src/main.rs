use {
    clinic_payments::{
        AppState,
        adapters::{gateway_client::HttpGateway, webhook_signature::WebhookVerifier},
        config::Settings,
        infra::postgres::PgStore,
        services::{
            Stores,
            orchestrator::{OrchestratorSettings, TransactionOrchestrator},
            reconciler::WebhookReconciler,
            worker::run_orphan_sweeper,
        },
        transport::http::router,
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&settings.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let stores = Stores::shared(Arc::new(PgStore::new(pool)));
    let gateway = HttpGateway::new(settings.gateway.clone()).expect("failed to build gateway client");

    let reconciler = Arc::new(WebhookReconciler::new(
        WebhookVerifier::new(
            settings.webhooks.events_secret.clone(),
            settings.webhooks.require_signature,
        ),
        &stores,
        settings.webhooks.orphan_retention,
    ));
    let orchestrator = Arc::new(TransactionOrchestrator::new(
        Arc::new(gateway),
        settings.amount_policy.clone(),
        &stores,
        reconciler.clone(),
        OrchestratorSettings {
            gateway_timeout: settings.gateway.timeout,
            payment_window: settings.payment_window,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(run_orphan_sweeper(
        reconciler.clone(),
        settings.webhooks.sweep_interval,
        shutdown_rx,
    ));

    let state = AppState {
        orchestrator,
        reconciler,
    };
    // Worst case is acceptance tokens plus two creation attempts, then stores.
    let app = router(state, settings.gateway.timeout * 4 + Duration::from_secs(5));

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .expect("failed to bind");
    tracing::info!(addr = %settings.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "orphan sweeper panicked");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

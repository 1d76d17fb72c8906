pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod transport;

use {
    services::{orchestrator::TransactionOrchestrator, reconciler::WebhookReconciler},
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub reconciler: Arc<WebhookReconciler>,
}

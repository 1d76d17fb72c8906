use {
    crate::{
        AppState,
        domain::{error::PaymentError, id::ExternalId, money::MoneyAmount},
        services::orchestrator::{CreatePaymentLink, CreateTransaction, TransactionReceipt},
        transport::http::errors::ApiError,
    },
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    },
    serde::Deserialize,
    std::future::Future,
};

/// Runs a creation flow on its own task. A dropped request must not stop it
/// between the gateway accepting and the local row being written.
async fn detached<T>(
    work: impl Future<Output = Result<T, PaymentError>> + Send + 'static,
) -> Result<T, PaymentError>
where
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| PaymentError::Reconciliation(format!("creation task aborted: {e}")))?
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransaction>,
) -> Result<(StatusCode, Json<TransactionReceipt>), ApiError> {
    let orchestrator = state.orchestrator.clone();
    let receipt = detached(async move { orchestrator.create_transaction(request).await }).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn create_payment_link(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentLink>,
) -> Result<(StatusCode, Json<TransactionReceipt>), ApiError> {
    let orchestrator = state.orchestrator.clone();
    let receipt = detached(async move { orchestrator.create_payment_link(request).await }).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<TransactionReceipt>, ApiError> {
    let external_id = ExternalId::new(external_id)?;
    let receipt = state.orchestrator.refresh_transaction(&external_id).await?;
    Ok(Json(receipt))
}

pub async fn confirm_transaction(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Json(proof): Json<serde_json::Value>,
) -> Result<Json<TransactionReceipt>, ApiError> {
    let external_id = ExternalId::new(external_id)?;
    let receipt = state
        .orchestrator
        .confirm_transaction(&external_id, &proof)
        .await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct VoidBody {
    #[serde(default)]
    pub amount_in_cents: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn void_transaction(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
    Json(body): Json<VoidBody>,
) -> Result<Json<TransactionReceipt>, ApiError> {
    let external_id = ExternalId::new(external_id)?;
    let amount = body.amount_in_cents.map(MoneyAmount::new).transpose()?;
    let receipt = state
        .orchestrator
        .void_transaction(&external_id, amount, body.reason)
        .await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    #[serde(default = "default_older_than_minutes")]
    pub older_than_minutes: i64,
}

fn default_older_than_minutes() -> i64 {
    60
}

pub async fn pending_purchases(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if query.older_than_minutes < 0 {
        return Err(PaymentError::Validation("older_than_minutes must not be negative".into()).into());
    }
    let purchases = state
        .orchestrator
        .pending_report(chrono::Duration::minutes(query.older_than_minutes))
        .await?;
    Ok(Json(serde_json::json!({
        "older_than_minutes": query.older_than_minutes,
        "count": purchases.len(),
        "purchases": purchases,
    })))
}

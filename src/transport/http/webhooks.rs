use {
    crate::{
        AppState, adapters::webhook_signature::CHECKSUM_HEADER,
        transport::http::errors::ApiError,
    },
    axum::{
        Json,
        body::Bytes,
        extract::{Path, State},
        http::HeaderMap,
    },
    uuid::Uuid,
};

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(body_len = body.len(), outcome = tracing::field::Empty)
)]
pub async fn wh_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let checksum = headers
        .get(CHECKSUM_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.reconciler.ingest(&body, checksum).await?;

    tracing::Span::current().record("outcome", tracing::field::debug(&outcome));
    Ok(Json(serde_json::json!({ "status": outcome })))
}

#[tracing::instrument(name = "webhook_replay", skip_all, fields(webhook_id = %id))]
pub async fn replay_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.reconciler.replay(id).await?;
    Ok(Json(serde_json::json!({ "id": id, "status": outcome })))
}

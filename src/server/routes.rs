use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::error::ServerError;
use super::state::AppState;
use super::utils::{check_bearer, parse_content_type, validate_body_size};
use crate::invocation::InvocationPayload;

#[derive(Debug, Serialize)]
pub struct InvokeAccepted {
    pub invocation_id: Uuid,
    pub worker: String,
}

/// Worker invocation endpoint (POST /invoke/{worker})
///
/// Validates and decodes the payload, then runs the entry point in a
/// background task and answers 202 immediately. The caller learns only that
/// the execution was accepted.
pub async fn invoke(
    State(state): State<AppState>,
    Path(worker): Path<String>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ServerError> {
    if worker != *state.worker_name {
        return Err(ServerError::UnknownWorker(worker));
    }

    if let Some(expected) = &state.auth_token {
        let provided = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        check_bearer(provided, expected)?;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::InvalidPayload("missing Content-Type header".into()))?;
    parse_content_type(content_type)?;

    let body_bytes = read_body(body, state.max_payload_bytes).await?;
    let payload = InvocationPayload::decode(&body_bytes)?;

    let invocation_id = Uuid::now_v7();
    info!(
        %invocation_id,
        worker = %worker,
        harvest_type = payload.harvest_type().unwrap_or("-"),
        kind = ?payload.kind(),
        "Invocation accepted"
    );

    let entry = state.entry.clone();
    tokio::spawn(async move {
        match entry.handle(payload).await {
            Ok(result) => info!(%invocation_id, outcome = %result.body, "Invocation finished"),
            Err(err) => error!(%invocation_id, error = %err, "Invocation failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(InvokeAccepted {
            invocation_id,
            worker,
        }),
    ))
}

/// Chain status endpoint (GET /chains/{chain_id})
pub async fn get_chain(
    State(state): State<AppState>,
    Path(chain_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let chain_id = Uuid::parse_str(&chain_id)
        .map_err(|_| ServerError::InvalidPayload(format!("invalid chain id: {}", chain_id)))?;
    let ledger = state
        .ledger
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("chain ledger is disabled".into()))?;

    let history = ledger
        .history(&chain_id)
        .map_err(|e| ServerError::Internal(format!("Failed to read chain: {}", e)))?
        .ok_or_else(|| ServerError::NotFound(format!("chain {chain_id}")))?;

    Ok((StatusCode::OK, Json(history)))
}

/// Counter snapshot (GET /metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "worker": &*state.worker_name,
        "mode": state.entry.mode(),
        "ledger": state.ledger.is_some(),
    }))
}

async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ServerError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ServerError::Internal(err.to_string()))?
        .to_bytes()
        .to_vec();

    validate_body_size(&data, max_size)?;

    Ok(data)
}

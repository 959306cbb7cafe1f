//! HTTP handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;

use crate::delay;
use crate::error::{AppError, Result};
use crate::models::{AnnounceDelayRequest, AnnounceResponse, DelayQueueItem, DelayQueueQuery, VendorDelay};
use crate::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/announce-delay", post(announce_delay))
        .route("/delay-queue", get(delay_queue))
        .route("/delay-report", get(delay_report))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// `POST /announce-delay`
pub async fn announce_delay(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AnnounceDelayRequest>, JsonRejection>,
) -> Result<Json<AnnounceResponse>> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let response = delay::announce_delay(&state, request.order_id, Utc::now()).await?;
    Ok(Json(response))
}

/// `GET /delay-queue?agent_id=`
pub async fn delay_queue(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<DelayQueueQuery>, QueryRejection>,
) -> Result<Json<Vec<DelayQueueItem>>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let items = delay::assign_queue(&state, query.agent_id).await?;
    Ok(Json(items))
}

/// `GET /delay-report`
pub async fn delay_report(State(state): State<Arc<AppState>>) -> Result<Json<Vec<VendorDelay>>> {
    let rows = delay::vendor_report(&state, Utc::now()).await?;
    Ok(Json(rows))
}

//! HTTP routes for the scheduler control plane and the posting queue.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Json,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use cadence_scheduler::{
    SchedulerKey, SchedulerRegistry, SchedulingPolicy, StatusReport, next_fire_time,
};
use cadence_store::{IngestItem, ItemStore, ListFilter, Platform, ScheduledItem};

use crate::WebError;

/// Shared state for the HTTP layer.
pub struct AppState {
    pub store: ItemStore,
    pub registry: Arc<SchedulerRegistry>,
    pub policy: SchedulingPolicy,
}

/// Create the router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Scheduler control plane
        .route("/api/scheduler/start", post(start_scheduler))
        .route("/api/scheduler/stop", post(stop_scheduler))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/scheduler/manual-post", post(manual_post))
        // Posting queue
        .route("/api/items/ingest", post(ingest_items))
        .route("/api/items", get(list_items))
        .route("/api/items/accept", post(accept_item))
        .route("/api/items/reject", post(reject_item))
        .route("/api/items/deselect", post(deselect_items))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    platform: String,
    account: String,
}

impl KeyQuery {
    fn parse(&self) -> Result<SchedulerKey, WebError> {
        let platform: Platform = self.platform.parse().map_err(WebError::Store)?;
        Ok(SchedulerKey::new(platform, self.account.as_str()))
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn start_scheduler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, WebError> {
    let key = query.parse()?;
    let report = state.registry.start(&key).await;

    let message = if report.already_running {
        format!("Scheduler already running for {key}")
    } else {
        format!("Scheduler started for {key}")
    };
    Ok(Json(json!({
        "message": message,
        "status": report.status,
        "alreadyRunning": report.already_running,
    })))
}

async fn stop_scheduler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, WebError> {
    let key = query.parse()?;
    let report = state.registry.stop(&key).await;

    let message = if report.was_running {
        format!("Scheduler stopped for {key}")
    } else {
        format!("Scheduler was not running for {key}")
    };
    Ok(Json(json!({
        "message": message,
        "status": report.status,
        "wasRunning": report.was_running,
    })))
}

async fn scheduler_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<StatusReport>, WebError> {
    let key = query.parse()?;
    Ok(Json(state.registry.status(&key).await))
}

async fn manual_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Value>, WebError> {
    let key = query.parse()?;
    let outcome = state.registry.manual_trigger(&key).await?;
    Ok(Json(json!({
        "message": format!("Manual post triggered for {key}"),
        "result": outcome,
    })))
}

#[derive(Debug, Deserialize)]
struct AccountQuery {
    account: String,
}

async fn ingest_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountQuery>,
    Json(raw): Json<Vec<IngestItem>>,
) -> Result<Json<Value>, WebError> {
    if raw.is_empty() {
        return Err(WebError::BadRequest("no items to ingest".to_string()));
    }
    let items = state.store.ingest(&query.account, raw).await;
    Ok(Json(json!({
        "message": format!("Ingested {} items", items.len()),
        "count": items.len(),
        "items": items,
    })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    account: String,
    selected: Option<bool>,
    posted: Option<bool>,
}

async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ScheduledItem>> {
    let filter = ListFilter {
        selected: query.selected,
        posted: query.posted,
    };
    Json(state.store.list(&query.account, filter).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptRequest {
    account: String,
    item_id: String,
    post_type: Option<String>,
}

async fn accept_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptRequest>,
) -> Result<Json<Value>, WebError> {
    let policy = state.policy.clone();
    let receipt = state
        .store
        .accept(&req.account, &req.item_id, req.post_type, Utc::now(), |base| {
            let mut rng = rand::rng();
            next_fire_time(base, &policy, &mut rng)
        })
        .await?;

    Ok(Json(json!({
        "message": format!("Scheduled in {}", receipt.scheduled_in),
        "scheduledIn": receipt.scheduled_in,
        "item": receipt.item,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectRequest {
    account: String,
    item_id: String,
}

async fn reject_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<Value>, WebError> {
    let removed = state.store.reject(&req.account, &req.item_id).await?;
    Ok(Json(json!({
        "message": "Item rejected",
        "item": removed,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeselectRequest {
    account: String,
    item_ids: Vec<String>,
}

async fn deselect_items(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeselectRequest>,
) -> Result<Json<Value>, WebError> {
    let policy = state.policy.clone();
    let count = state
        .store
        .deselect(&req.account, &req.item_ids, Utc::now(), |base| {
            let mut rng = rand::rng();
            next_fire_time(base, &policy, &mut rng)
        })
        .await?;

    Ok(Json(json!({
        "message": format!("Deselected {count} items"),
        "count": count,
    })))
}

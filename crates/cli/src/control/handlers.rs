//! Control API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use config_loader::ReloadOutcome;
use contracts::{Credentials, ListenerState, RouteEntry};
use dispatcher::MetricsSnapshot;
use observability::StatsSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::error::{ApiError, ApiResult};
use super::ControlState;

// ===== Request / response bodies =====

#[derive(Debug, Deserialize)]
pub struct CreateRouteRequest {
    pub chat_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "urls")]
    pub target_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "urls")]
    pub target_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveTargetQuery {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub instance_id: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RouteView {
    pub chat_id: String,
    #[serde(flatten)]
    pub entry: RouteEntry,
}

#[derive(Debug, Serialize)]
pub struct RoutesResponse {
    pub version: u64,
    pub routes: Vec<RouteView>,
}

#[derive(Debug, Serialize)]
pub struct RemoveTargetResponse {
    /// Remaining route, `null` when its last target was removed
    pub route: Option<RouteView>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub instance_id: String,
    pub token_set: bool,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub reload: ReloadOutcome,
    pub listener_state: ListenerState,
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub listener_state: ListenerState,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub listener_state: ListenerState,
    pub config_version: u64,
    pub route_count: usize,
    pub target_count: usize,
    pub credentials_configured: bool,
    pub in_flight: usize,
    pub notification_subscribers: usize,
    pub uptime_secs: u64,
    pub deliveries: MetricsSnapshot,
    pub latency_ms: StatsSummary,
}

// ===== Status =====

pub async fn status(State(state): State<ControlState>) -> Json<StatusResponse> {
    let snapshot = state.source.current();
    Json(StatusResponse {
        listener_state: state.supervisor.state(),
        config_version: snapshot.version,
        route_count: snapshot.routes.len(),
        target_count: snapshot.routes.target_count(),
        credentials_configured: snapshot.credentials.is_configured(),
        in_flight: state.dispatch.in_flight(),
        notification_subscribers: state.hub.subscriber_count(),
        uptime_secs: state.started.elapsed().as_secs(),
        deliveries: state.dispatch.dispatcher().metrics(),
        latency_ms: state.dispatch.dispatcher().latency(),
    })
}

pub async fn execution_counts(
    State(state): State<ControlState>,
) -> Json<BTreeMap<String, BTreeMap<String, u64>>> {
    Json(state.dispatch.dispatcher().execution_counts().snapshot())
}

// ===== Lifecycle =====

/// Re-read the file; a credential change restarts the listener.
pub async fn reload(State(state): State<ControlState>) -> ApiResult<Json<ApplyResponse>> {
    let outcome = state.source.reload().await?;
    let listener_state = apply_credentials(&state, outcome).await?;
    Ok(Json(ApplyResponse {
        reload: outcome,
        listener_state,
    }))
}

/// Re-read credentials from the file and restart the listener even when
/// they did not change.
pub async fn restart(State(state): State<ControlState>) -> ApiResult<Json<RestartResponse>> {
    let outcome = state.source.reload().await?;
    let listener_state = if outcome.credentials_changed {
        state
            .supervisor
            .reconfigure(state.source.current().credentials.clone())
            .await?
    } else {
        state.supervisor.restart().await?
    };
    info!(state = %listener_state, "Listener restart requested");
    Ok(Json(RestartResponse { listener_state }))
}

// ===== Routes =====

pub async fn list_routes(State(state): State<ControlState>) -> Json<RoutesResponse> {
    let snapshot = state.source.current();
    let routes = snapshot
        .routes
        .sorted()
        .into_iter()
        .map(|(id, entry)| RouteView {
            chat_id: id.to_string(),
            entry: entry.clone(),
        })
        .collect();
    Json(RoutesResponse {
        version: snapshot.version,
        routes,
    })
}

pub async fn create_route(
    State(state): State<ControlState>,
    Json(req): Json<CreateRouteRequest>,
) -> ApiResult<(StatusCode, Json<RouteView>)> {
    let chat_id = req.chat_id.trim();
    if chat_id.is_empty() {
        return Err(ApiError::validation("chat_id must not be empty"));
    }
    let entry = state
        .source
        .add_route(chat_id, req.name.as_deref(), &req.target_urls)
        .await?;
    info!(chat_id = %chat_id, targets = entry.targets().len(), "Route added");
    Ok((
        StatusCode::CREATED,
        Json(RouteView {
            chat_id: chat_id.to_string(),
            entry,
        }),
    ))
}

pub async fn update_route(
    State(state): State<ControlState>,
    Path(chat_id): Path<String>,
    Json(req): Json<UpdateRouteRequest>,
) -> ApiResult<Json<RouteView>> {
    let entry = state
        .source
        .update_route(&chat_id, req.name.as_deref(), &req.target_urls)
        .await?;
    info!(chat_id = %chat_id, targets = entry.targets().len(), "Route updated");
    Ok(Json(RouteView { chat_id, entry }))
}

pub async fn delete_route(
    State(state): State<ControlState>,
    Path(chat_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.source.delete_route(&chat_id).await?;
    info!(chat_id = %chat_id, "Route deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_target(
    State(state): State<ControlState>,
    Path(chat_id): Path<String>,
    Query(query): Query<RemoveTargetQuery>,
) -> ApiResult<Json<RemoveTargetResponse>> {
    let remaining = state.source.remove_target(&chat_id, &query.url).await?;
    info!(chat_id = %chat_id, url = %query.url, "Target removed");
    Ok(Json(RemoveTargetResponse {
        route: remaining.map(|entry| RouteView { chat_id, entry }),
    }))
}

// ===== Settings =====

pub async fn get_settings(State(state): State<ControlState>) -> ApiResult<Json<SettingsResponse>> {
    let credentials = state.source.credentials().await?;
    Ok(Json(SettingsResponse {
        token_set: !credentials.token.trim().is_empty(),
        configured: credentials.is_configured(),
        instance_id: credentials.instance_id,
    }))
}

pub async fn update_settings(
    State(state): State<ControlState>,
    Json(req): Json<SettingsRequest>,
) -> ApiResult<Json<ApplyResponse>> {
    let outcome = state
        .source
        .update_credentials(Credentials::new(req.instance_id, req.token))
        .await?;
    let listener_state = apply_credentials(&state, outcome).await?;
    Ok(Json(ApplyResponse {
        reload: outcome,
        listener_state,
    }))
}

async fn apply_credentials(state: &ControlState, outcome: ReloadOutcome) -> ApiResult<ListenerState> {
    if !outcome.credentials_changed {
        return Ok(state.supervisor.state());
    }
    let credentials = state.source.current().credentials.clone();
    Ok(state.supervisor.reconfigure(credentials).await?)
}

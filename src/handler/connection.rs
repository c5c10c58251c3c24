use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use flaps_bus::{ConnectionId, Effect, EffectManager, Phase};
use serde::{Deserialize, Serialize};

use crate::{
    handler::{ApiError, ApiJsonResult, AppState},
    host::SimClient,
};

pub fn connection_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_connections).post(connect))
        .route("/{id}", get(get_connection).delete(disconnect))
        .route("/{id}/effects", post(apply_effects))
        .route("/{id}/flight", put(update_flight))
        .route("/{id}/shake", post(shake))
}

#[derive(Serialize, Deserialize)]
struct ConnectRequest {
    name: String,
}

#[derive(Serialize, Deserialize)]
struct ConnectResponse {
    id: ConnectionId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct EffectRequest {
    enable: Vec<String>,
    disable: Vec<String>,
    /// Replaces the whole mask before `enable`/`disable` apply.
    mask: Option<i32>,
    param: Option<f32>,
    signed_param: Option<f32>,
    transition_ticks: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FlightRequest {
    yaw: f32,
    #[serde(default)]
    gliding: bool,
}

/// What the bus holds for a connection next to what its client decoded.
#[derive(Debug, Serialize, Deserialize)]
struct ConnectionView {
    id: ConnectionId,
    name: String,
    received: u64,
    time_of_day: Option<i64>,
    client_mask: Option<u8>,
    client_param: Option<f32>,
    effects: Vec<String>,
    bus_mask: Option<u8>,
    bus_param: Option<f32>,
    transitioning: bool,
    yaw: f32,
    gliding: bool,
}

impl ConnectionView {
    fn new(id: ConnectionId, client: SimClient, state: &AppState) -> Self {
        let decoded = client.decoded();
        let snapshot = state.bus.snapshot(id);
        let effects = decoded
            .map(|(mask, _)| {
                Effect::BUILTIN
                    .iter()
                    .filter(|e| mask & e.mask() != 0)
                    .map(|e| e.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id,
            name: client.name,
            received: client.received,
            time_of_day: client.last_update.map(|u| u.time_of_day),
            client_mask: decoded.map(|(mask, _)| mask),
            client_param: decoded.map(|(_, param)| param),
            effects,
            yaw: client.yaw,
            gliding: client.gliding,
            bus_mask: snapshot.as_ref().map(|s| s.mask()),
            bus_param: snapshot.as_ref().map(|s| s.param()),
            transitioning: snapshot.is_some_and(|s| s.phase() == Phase::Transitioning),
        }
    }
}

fn lookup_effect(name: &str) -> Result<Effect, ApiError> {
    Effect::builtin(name)
        .ok_or_else(|| ApiError::bad_request(anyhow::anyhow!("unknown effect: {}", name)))
}

/// Stages `request` on `manager` without committing.
pub(crate) fn stage_request(
    manager: &mut EffectManager,
    request: &EffectRequest,
) -> Result<(), ApiError> {
    if request.param.is_some() && request.signed_param.is_some() {
        return Err(ApiError::bad_request(anyhow::anyhow!(
            "param and signed_param are exclusive"
        )));
    }

    if let Some(mask) = request.mask {
        manager.set_mask(mask)?;
    }
    for name in &request.disable {
        manager.disable(&lookup_effect(name)?);
    }
    for name in &request.enable {
        manager.enable(&lookup_effect(name)?);
    }
    if let Some(param) = request.param {
        manager.set_param01(param);
    }
    if let Some(signed) = request.signed_param {
        manager.set_param_signed(signed);
    }
    if let Some(ticks) = request.transition_ticks {
        manager.set_transition_ticks(ticks);
    }
    Ok(())
}

async fn list_connections(State(state): State<AppState>) -> Json<Vec<ConnectionView>> {
    let views = state
        .host
        .clients()
        .into_iter()
        .map(|(id, client)| ConnectionView::new(id, client, &state))
        .collect();
    Json(views)
}

async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> ApiJsonResult<ConnectResponse> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request(anyhow::anyhow!("name is required")));
    }
    let id = state.host.connect(&request.name);
    Ok(Json(ConnectResponse { id }))
}

async fn get_connection(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> ApiJsonResult<ConnectionView> {
    let client = state
        .host
        .client(id)
        .ok_or_else(|| ApiError::not_found(anyhow::anyhow!("connection {} not found", id)))?;
    Ok(Json(ConnectionView::new(id, client, &state)))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> ApiJsonResult<String> {
    if !state.host.disconnect(&state.bus, id) {
        return Err(ApiError::not_found(anyhow::anyhow!(
            "connection {} not found",
            id
        )));
    }
    Ok(Json("success".to_string()))
}

async fn apply_effects(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Json(request): Json<EffectRequest>,
) -> ApiJsonResult<String> {
    if state.host.client(id).is_none() {
        return Err(ApiError::not_found(anyhow::anyhow!(
            "connection {} not found",
            id
        )));
    }

    let mut manager = state.bus.connection(id);
    stage_request(&mut manager, &request)?;
    manager.commit();
    Ok(Json("success".to_string()))
}

async fn update_flight(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
    Json(request): Json<FlightRequest>,
) -> ApiJsonResult<String> {
    if !request.yaw.is_finite() {
        return Err(ApiError::bad_request(anyhow::anyhow!(
            "yaw must be finite: {}",
            request.yaw
        )));
    }
    if !state.host.set_flight(id, request.yaw, request.gliding) {
        return Err(ApiError::not_found(anyhow::anyhow!(
            "connection {} not found",
            id
        )));
    }
    Ok(Json("success".to_string()))
}

/// Drops whatever the connection had and starts a plain shake.
async fn shake(
    State(state): State<AppState>,
    Path(id): Path<ConnectionId>,
) -> ApiJsonResult<String> {
    if state.host.client(id).is_none() {
        return Err(ApiError::not_found(anyhow::anyhow!(
            "connection {} not found",
            id
        )));
    }

    state.bus.clear(id);
    state.bus.connection(id).enable(&Effect::SHAKE).commit();
    Ok(Json("success".to_string()))
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

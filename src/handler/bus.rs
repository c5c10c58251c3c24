use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use flaps_bus::SendMode;
use serde::{Deserialize, Serialize};

use crate::handler::AppState;

pub fn bus_router() -> Router<AppState> {
    Router::new()
        .route("/", get(bus_status))
        .route("/send-mode", put(set_send_mode))
}

#[derive(Serialize, Deserialize)]
struct BusStatus {
    running: bool,
    tick: u64,
    tracked: usize,
    send_mode: SendMode,
}

#[derive(Serialize, Deserialize)]
struct SendModeRequest {
    mode: SendMode,
}

async fn bus_status(State(state): State<AppState>) -> Json<BusStatus> {
    Json(BusStatus {
        running: state.bus.is_running(),
        tick: state.bus.tick_count(),
        tracked: state.bus.tracked().len(),
        send_mode: state.bus.send_mode(),
    })
}

async fn set_send_mode(
    State(state): State<AppState>,
    Json(request): Json<SendModeRequest>,
) -> Json<String> {
    state.bus.set_send_mode(request.mode);
    log::info!("send mode set to {:?}", request.mode);
    Json("success".to_string())
}

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use flaps_bus::{Bus, BusConfig, Effect, Host, Phase};
use tower::ServiceExt as _;

use super::*;
use crate::host::SimHost;

fn app_state() -> AppState {
    let host = Arc::new(SimHost::new());
    let bus = Arc::new(Bus::new(
        Arc::clone(&host) as Arc<dyn Host>,
        BusConfig::default(),
    ));
    AppState { bus, host }
}

fn app(state: &AppState) -> Router {
    Router::new()
        .nest("/connections", connection_router())
        .with_state(state.clone())
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(body: &str) -> EffectRequest {
    serde_json::from_str(body).unwrap()
}

#[test]
fn test_stage_request_enable_disable() {
    let state = app_state();
    let id = state.host.connect("ana");
    let mut manager = state.bus.connection(id);
    manager.enable(&Effect::ROLL).commit();

    stage_request(
        &mut manager,
        &request(r#"{"disable":["roll"],"enable":["HEAT_DISTORTION"],"param":0.25}"#),
    )
    .unwrap();
    manager.commit();

    let snapshot = state.bus.snapshot(id).unwrap();
    assert_eq!(snapshot.mask(), 0b100);
    assert_eq!(snapshot.param(), 0.25);
}

#[test]
fn test_stage_request_transition() {
    let state = app_state();
    let id = state.host.connect("ben");
    let mut manager = state.bus.connection(id);

    let staged = request(r#"{"signed_param":1.0,"transition_ticks":20}"#);
    stage_request(&mut manager, &staged).unwrap();
    manager.commit();

    let snapshot = state.bus.snapshot(id).unwrap();
    assert_eq!(snapshot.phase(), Phase::Transitioning);
    assert_eq!(snapshot.target_param(), 1.0);
}

#[test]
fn test_stage_request_rejects() {
    let state = app_state();
    let id = state.host.connect("cy");
    let mut manager = state.bus.connection(id);

    assert!(stage_request(&mut manager, &request(r#"{"enable":["wobble"]}"#)).is_err());
    assert!(stage_request(&mut manager, &request(r#"{"mask":256}"#)).is_err());
    let both = request(r#"{"param":0.1,"signed_param":0.1}"#);
    assert!(stage_request(&mut manager, &both).is_err());
}

#[tokio::test]
async fn test_connect_and_apply_effects() -> anyhow::Result<()> {
    let state = app_state();

    let response = app(&state)
        .oneshot(json_request("POST", "/connections", r#"{"name":"dee"}"#))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let created: ConnectResponse = serde_json::from_slice(&body)?;

    let uri = format!("/connections/{}/effects", created.id);
    let response = app(&state)
        .oneshot(json_request("POST", &uri, r#"{"enable":["shake"],"param":1.0}"#))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    state.bus.tick();

    let response = app(&state)
        .oneshot(json_request("GET", &format!("/connections/{}", created.id), ""))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    let view: ConnectionView = serde_json::from_slice(&body)?;
    assert_eq!(view.name, "dee");
    assert_eq!(view.client_mask, Some(2));
    assert_eq!(view.client_param, Some(1.0));
    assert_eq!(view.effects, vec!["SHAKE".to_string()]);
    assert_eq!(view.bus_mask, Some(2));
    Ok(())
}

#[tokio::test]
async fn test_error_statuses() -> anyhow::Result<()> {
    let state = app_state();
    let id = state.host.connect("eli");
    let missing = ConnectionId::new_v4();

    let response = app(&state)
        .oneshot(json_request(
            "POST",
            &format!("/connections/{}/effects", missing),
            "{}",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&state)
        .oneshot(json_request(
            "POST",
            &format!("/connections/{}/effects", id),
            r#"{"mask":999}"#,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&state)
        .oneshot(json_request("DELETE", &format!("/connections/{}", id), ""))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.host.client(id).is_none());

    let response = app(&state)
        .oneshot(json_request("DELETE", &format!("/connections/{}", id), ""))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_flight_and_shake_routes() -> anyhow::Result<()> {
    let state = app_state();
    let id = state.host.connect("gale");
    state
        .bus
        .connection(id)
        .enable(&Effect::ROLL)
        .set_param01(0.1)
        .commit();

    let response = app(&state)
        .oneshot(json_request(
            "PUT",
            &format!("/connections/{}/flight", id),
            r#"{"yaw":-90.5,"gliding":true}"#,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let client = state.host.client(id).unwrap();
    assert_eq!(client.yaw, -90.5);
    assert!(client.gliding);

    let response = app(&state)
        .oneshot(json_request(
            "PUT",
            &format!("/connections/{}/flight", ConnectionId::new_v4()),
            r#"{"yaw":0.0}"#,
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&state)
        .oneshot(json_request(
            "POST",
            &format!("/connections/{}/shake", id),
            "",
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // shake replaces the roll and resets the parameter
    let snapshot = state.bus.snapshot(id).unwrap();
    assert_eq!(snapshot.mask(), Effect::SHAKE.mask());
    assert_eq!(snapshot.param(), 0.5);
    Ok(())
}

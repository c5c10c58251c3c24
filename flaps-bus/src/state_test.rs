use super::*;
use crate::easing::smoothstep;

fn state_at(param: f32) -> ConnectionState {
    let mut state = ConnectionState::new();
    state.set_param(param, 0, 0);
    state
}

#[test]
fn test_defaults() {
    let state = ConnectionState::new();
    assert_eq!(state.mask(), 0);
    assert_eq!(state.param(), 0.5);
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.last_sent(), None);
    assert_eq!(state.payload(), Ok(46));
}

#[test]
fn test_immediate_set() {
    let mut state = state_at(0.0);
    state.set_param(0.75, 0, 3);
    assert_eq!(state.param(), 0.75);
    assert_eq!(state.phase(), Phase::Idle);

    state.set_param(1.5, 0, 4);
    assert_eq!(state.param(), 1.0);
}

#[test]
fn test_transition_scenario() {
    let mut state = state_at(0.0);
    let start = 100;
    state.set_param(1.0, 10, start);
    assert_eq!(state.phase(), Phase::Transitioning);

    state.advance(start);
    assert_eq!(state.param(), 0.0);

    state.advance(start + 5);
    assert_eq!(state.param(), smoothstep(0.5));
    assert_eq!(state.param(), 0.5);
    assert_eq!(state.phase(), Phase::Transitioning);

    state.advance(start + 10);
    assert_eq!(state.param(), 1.0);
    assert_eq!(state.phase(), Phase::Idle);

    // idle state ignores further ticks
    state.advance(start + 50);
    assert_eq!(state.param(), 1.0);
}

#[test]
fn test_transition_is_monotone() {
    let mut state = state_at(0.2);
    state.set_param(0.9, 20, 0);
    let mut prev = state.param();
    for now in 1..=20 {
        state.advance(now);
        assert!(state.param() >= prev);
        assert!((0.0..=1.0).contains(&state.param()));
        prev = state.param();
    }
    assert_eq!(state.param(), 0.9);
}

#[test]
fn test_retarget_starts_from_current_value() {
    let mut state = state_at(0.0);
    state.set_param(1.0, 10, 0);
    state.advance(5);
    let observed = state.param();
    assert!((observed - 0.5).abs() < 1e-6);

    state.set_param(0.0, 10, 5);
    assert_eq!(state.start_param(), observed);
    assert_eq!(state.target_param(), 0.0);
    assert_eq!(state.start_tick(), 5);

    // same tick: no easing yet
    state.advance(5);
    assert_eq!(state.param(), observed);

    state.advance(15);
    assert_eq!(state.param(), 0.0);
    assert_eq!(state.phase(), Phase::Idle);
}

#[test]
fn test_immediate_set_cancels_transition() {
    let mut state = state_at(0.0);
    state.set_param(1.0, 10, 0);
    state.advance(3);
    state.set_param(0.25, 0, 3);
    assert_eq!(state.phase(), Phase::Idle);
    state.advance(8);
    assert_eq!(state.param(), 0.25);
}

#[test]
fn test_apply_mask() {
    let mut state = ConnectionState::new();
    state.apply_mask(0xFF, 0b0000_0001);
    state.apply_mask(!0b0000_0001, 0b0000_0100);
    assert_eq!(state.mask(), 0b0000_0100);
}

#[test]
fn test_payload_rejects_wide_mask() {
    let mut state = ConnectionState::new();
    state.apply_mask(0, 0b0111_1111);
    assert_eq!(state.payload(), Err(CodecError::MaskOutOfRange(127)));
}

#[test]
fn test_rejected_reported_once() {
    let mut state = ConnectionState::new();
    assert!(!state.is_rejected());

    assert!(state.set_rejected(true));
    assert!(!state.set_rejected(true));
    assert!(state.is_rejected());

    assert!(!state.set_rejected(false));
    assert!(!state.is_rejected());
    assert!(state.set_rejected(true));
}

//! Hooks common to both charts.

use super::GateEnv;
use crate::core::State;
use crate::engine::Session;
use crate::notify::{call_staff, Direction};
use tracing::debug;

/// Keys used in a chart's `info` record.
pub mod keys {
    pub const LICENSE_NUMBER: &str = "license_number";
    pub const TID: &str = "tid";
    pub const REASON: &str = "reason";
    pub const CAR_PASSED: &str = "car_passed";
    pub const CAR_CLEARED_AT: &str = "car_cleared_at";
    pub const STAFF_CALLED: &str = "staff_called";
    pub const CHECKED: &str = "checked_license_numbers";
}

/// Forget detections, close the barricade, drop the previous visit's info.
pub(crate) fn idle_entry<S: State>(session: &mut Session<S>, env: &mut GateEnv) {
    env.detector.clear();
    env.gate.close_barricade();
    session.clear_info();
}

pub(crate) fn leave_idle<S: State>(session: &mut Session<S>, env: &GateEnv, detect: S) {
    if env.detector.has_candidate() {
        session.request_transition(detect);
    }
}

pub(crate) fn open_for_car<S: State>(session: &mut Session<S>, env: &mut GateEnv) {
    env.gate.open_barricade();
    session.set(keys::CAR_PASSED, false);
}

/// Return to `idle` once a car has passed and the sensor has read clear for
/// `car_clear`. A car reappearing restarts the wait.
pub(crate) fn await_car_clear<S: State>(session: &mut Session<S>, env: &GateEnv, idle: S) {
    let passed = session.get_bool(keys::CAR_PASSED).unwrap_or(false);
    if env.sensors().car_present {
        if !passed {
            debug!("Car entered barricade area");
            session.set(keys::CAR_PASSED, true);
        }
        if session.info().contains_key(keys::CAR_CLEARED_AT) {
            session.remove(keys::CAR_CLEARED_AT);
        }
        return;
    }
    if !passed {
        return;
    }
    let now = session.now();
    let cleared_at = match session.get_time(keys::CAR_CLEARED_AT) {
        Some(at) => at,
        None => {
            session.set_time(keys::CAR_CLEARED_AT, now);
            now
        }
    };
    if now - cleared_at >= env.timeouts.car_clear && session.has_elapsed(env.timeouts.car_clear) {
        session.request_transition(idle);
    }
}

/// Keep the next state from starting until the barricade has settled.
pub(crate) fn cooldown<S: State>(session: &mut Session<S>, env: &mut GateEnv) {
    session.hold(env.timeouts.cooldown);
}

pub(crate) fn reset_staff_call<S: State>(session: &mut Session<S>, _env: &mut GateEnv) {
    session.set(keys::STAFF_CALLED, false);
}

/// Page staff the first time the driver hovers during this visit.
pub(crate) fn escalate_once<S: State>(session: &mut Session<S>, env: &GateEnv, direction: Direction) {
    if env.sensors().hover && session.get_bool(keys::STAFF_CALLED) != Some(true) {
        call_staff(env.notifier.as_ref(), direction);
        session.set(keys::STAFF_CALLED, true);
    }
}

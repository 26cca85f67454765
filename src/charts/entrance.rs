//! Entrance gate chart.

use super::shared::{self, keys};
use super::{Chart, EngineSettings, GateEnv};
use crate::builder::{BuildError, ChartBuilder};
use crate::core::Clock;
use crate::engine::{Session, StateHooks};
use crate::notify::Direction;
use crate::remote::{Handler, RemoteStore};
use crate::state_enum;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

state_enum! {
    /// States of the entrance gate.
    pub enum EntranceState {
        Idle => "idle",
        Detect => "detect",
        Process => "process",
        Success => "success",
        Failed => "failed",
    }
    error: [Failed]
}

pub type EntranceChart = Chart<EntranceState>;

impl Chart<EntranceState> {
    /// Build the entrance chart published under `<name>/state`.
    pub fn entrance(
        name: &str,
        env: GateEnv,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Result<Self, BuildError> {
        let engine = ChartBuilder::<EntranceState, GateEnv>::new(name)
            .initial(EntranceState::Idle)
            .state(
                EntranceState::Idle,
                StateHooks::new()
                    .on_entry(shared::idle_entry)
                    .on_logic(|s: &mut EntranceSession, env: &mut GateEnv| {
                        shared::leave_idle(s, env, EntranceState::Detect)
                    }),
            )
            .state(EntranceState::Detect, StateHooks::new().on_logic(detect))
            .state(EntranceState::Process, StateHooks::new().on_entry(process))
            .state(
                EntranceState::Success,
                StateHooks::new()
                    .on_entry(shared::open_for_car)
                    .on_logic(|s: &mut EntranceSession, env: &mut GateEnv| {
                        shared::await_car_clear(s, env, EntranceState::Idle)
                    })
                    .on_exit(shared::cooldown),
            )
            .state(
                EntranceState::Failed,
                StateHooks::new()
                    .on_entry(shared::reset_staff_call)
                    .on_logic(failed),
            )
            .command(
                "set_idle",
                Handler::unit(|s: &mut EntranceSession| {
                    s.request_transition(EntranceState::Idle)
                }),
            )
            .command("set_process", Handler::arg(set_process))
            .heartbeat_interval(settings.heartbeat)
            .history_capacity(settings.history_capacity)
            .build(store, clock)?;
        Ok(Self::from_parts(engine, env))
    }
}

type EntranceSession = Session<EntranceState>;

fn detect(s: &mut EntranceSession, env: &mut GateEnv) {
    let sensors = env.sensors();
    if sensors.hover {
        s.clear_info();
        let candidate = env.detector.candidate();
        if !candidate.is_empty() {
            s.set(keys::LICENSE_NUMBER, candidate);
        }
        s.request_transition(EntranceState::Process);
        return;
    }
    if s.has_elapsed(env.timeouts.detect) || sensors.button_pressed {
        s.request_transition(EntranceState::Idle);
    }
}

fn process(s: &mut EntranceSession, env: &mut GateEnv) {
    let Some(license_number) = s.get_str(keys::LICENSE_NUMBER).map(str::to_string) else {
        s.replace_info(json!({ keys::REASON: "No license number to add." }));
        s.request_transition(EntranceState::Failed);
        return;
    };
    match env.ledger.reserve(&license_number) {
        Ok(tid) => {
            info!(license_number = %license_number, tid = %tid, "Entrance accepted");
            s.replace_info(json!({ keys::TID: tid, keys::LICENSE_NUMBER: license_number }));
            s.request_transition(EntranceState::Success);
        }
        Err(err) => {
            warn!(license_number = %license_number, error = %err, "Entrance rejected");
            match err.conflicting_tid() {
                Some(tid) => s.replace_info(json!({
                    keys::REASON: "Previous transaction has an issue.",
                    keys::TID: tid,
                    keys::LICENSE_NUMBER: license_number,
                })),
                None => s.replace_info(json!({
                    keys::REASON: "Cannot add transaction.",
                    keys::LICENSE_NUMBER: license_number,
                })),
            }
            s.request_transition(EntranceState::Failed);
        }
    }
}

fn failed(s: &mut EntranceSession, env: &mut GateEnv) {
    shared::escalate_once(s, env, Direction::In);

    let tid = s.get_str(keys::TID).map(str::to_string);
    if env.sensors().button_pressed {
        s.request_transition(EntranceState::Idle);
        return;
    }
    if tid.is_none() && s.has_elapsed(env.timeouts.failed) {
        s.request_transition(EntranceState::Idle);
        return;
    }
    let settled = tid.as_deref().is_some_and(|tid| env.ledger.is_paid(tid));
    if settled || s.has_elapsed(env.timeouts.failed_max) {
        s.request_transition(EntranceState::Idle);
    }
}

fn set_process(s: &mut EntranceSession, plate: &str) {
    let plate = plate.trim();
    if plate.is_empty() {
        warn!("set_process needs a license number");
        return;
    }
    s.replace_info(json!({ keys::LICENSE_NUMBER: plate }));
    s.request_transition(EntranceState::Process);
}

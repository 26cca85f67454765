//! Exit gate chart.

use super::shared::{self, keys};
use super::{Chart, EngineSettings, GateEnv};
use crate::builder::{BuildError, ChartBuilder};
use crate::core::Clock;
use crate::engine::{Session, StateHooks};
use crate::ledger::LedgerError;
use crate::notify::Direction;
use crate::remote::{Handler, RemoteStore};
use crate::state_enum;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

state_enum! {
    /// States of the exit gate.
    pub enum ExitState {
        Idle => "idle",
        Detect => "detect",
        Get => "get",
        Success => "success",
        Payment => "payment",
        Failed => "failed",
    }
    error: [Failed]
}

pub type ExitChart = Chart<ExitState>;

impl Chart<ExitState> {
    /// Build the exit chart published under `<name>/state`.
    pub fn exit(
        name: &str,
        env: GateEnv,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Result<Self, BuildError> {
        let engine = ChartBuilder::<ExitState, GateEnv>::new(name)
            .initial(ExitState::Idle)
            .state(
                ExitState::Idle,
                StateHooks::new()
                    .on_entry(shared::idle_entry)
                    .on_logic(|s: &mut ExitSession, env: &mut GateEnv| {
                        shared::leave_idle(s, env, ExitState::Detect)
                    }),
            )
            .state(
                ExitState::Detect,
                StateHooks::new().on_entry(start_detect).on_logic(detect),
            )
            .state(ExitState::Get, StateHooks::new().on_entry(get))
            .state(
                ExitState::Success,
                StateHooks::new()
                    .on_entry(success)
                    .on_logic(|s: &mut ExitSession, env: &mut GateEnv| {
                        shared::await_car_clear(s, env, ExitState::Idle)
                    })
                    .on_exit(shared::cooldown),
            )
            .state(
                ExitState::Payment,
                StateHooks::new()
                    .on_entry(shared::reset_staff_call)
                    .on_logic(payment),
            )
            .state(
                ExitState::Failed,
                StateHooks::new()
                    .on_entry(shared::reset_staff_call)
                    .on_logic(failed),
            )
            .command(
                "set_idle",
                Handler::unit(|s: &mut ExitSession| s.request_transition(ExitState::Idle)),
            )
            .command("set_get", Handler::arg(set_get))
            .heartbeat_interval(settings.heartbeat)
            .history_capacity(settings.history_capacity)
            .build(store, clock)?;
        Ok(Self::from_parts(engine, env))
    }
}

type ExitSession = Session<ExitState>;

/// Route to `failed`, keeping whatever identifies the visit.
fn fail(s: &mut ExitSession, reason: &str) {
    let mut info = json!({ keys::REASON: reason });
    for key in [keys::TID, keys::LICENSE_NUMBER] {
        if let Some(value) = s.info().get(key) {
            info[key] = value.clone();
        }
    }
    s.replace_info(info);
    s.request_transition(ExitState::Failed);
}

fn start_detect(s: &mut ExitSession, _env: &mut GateEnv) {
    s.set(keys::CHECKED, Value::Array(Vec::new()));
}

fn detect(s: &mut ExitSession, env: &mut GateEnv) {
    let mut checked = s.get_strings(keys::CHECKED);
    let candidates = env.detector.candidates();
    let before = checked.len();
    let mut found = None;
    for plate in &candidates {
        if checked.contains(plate) {
            continue;
        }
        match env.ledger.find_open(plate) {
            Some(tid) => {
                found = Some((tid, plate.clone()));
                break;
            }
            None => checked.push(plate.clone()),
        }
    }

    if let Some((tid, license_number)) = found {
        info!(license_number = %license_number, tid = %tid, "Exit matched transaction");
        s.replace_info(json!({ keys::TID: tid, keys::LICENSE_NUMBER: license_number }));
        s.request_transition(ExitState::Get);
        return;
    }
    if checked.len() != before {
        debug!(checked = checked.len(), "Plates without transaction");
        s.set(keys::CHECKED, checked.clone());
    }
    if env.sensors().hover {
        s.request_transition(ExitState::Idle);
        return;
    }
    let all_checked = candidates.iter().all(|plate| checked.contains(plate));
    if all_checked && s.has_elapsed(env.timeouts.detect) {
        s.replace_info(json!({ keys::REASON: "Not found license number in the system." }));
        s.request_transition(ExitState::Failed);
    }
}

fn get(s: &mut ExitSession, env: &mut GateEnv) {
    let Some(tid) = s.get_str(keys::TID).map(str::to_string) else {
        fail(s, "No transaction id.");
        return;
    };
    match env.ledger.get(&tid) {
        None => fail(s, "Transaction not exists in the system."),
        Some(tx) if tx.is_paid() => s.request_transition(ExitState::Success),
        Some(_) => s.request_transition(ExitState::Payment),
    }
}

fn success(s: &mut ExitSession, env: &mut GateEnv) {
    let Some(tid) = s.get_str(keys::TID).map(str::to_string) else {
        fail(s, "No transaction id.");
        return;
    };
    match env.ledger.close(&tid) {
        Ok(_) => shared::open_for_car(s, env),
        Err(LedgerError::NotFound(_)) => fail(s, "Transaction not exists in the system."),
        Err(err) => {
            warn!(tid = %tid, error = %err, "Cannot close transaction");
            fail(s, &format!("Cannot close transaction: {err}"));
        }
    }
}

fn payment(s: &mut ExitSession, env: &mut GateEnv) {
    shared::escalate_once(s, env, Direction::Out);

    let Some(tid) = s.get_str(keys::TID).map(str::to_string) else {
        fail(s, "No transaction id.");
        return;
    };
    match env.ledger.get(&tid) {
        None => fail(s, "Transaction not exists in the system."),
        Some(tx) if tx.is_paid() => s.request_transition(ExitState::Success),
        Some(_) if s.has_elapsed(env.timeouts.payment) => fail(s, "Payment timeout."),
        Some(_) if env.sensors().button_pressed => s.request_transition(ExitState::Idle),
        Some(_) => {}
    }
}

fn failed(s: &mut ExitSession, env: &mut GateEnv) {
    shared::escalate_once(s, env, Direction::Out);

    if s.has_elapsed(env.timeouts.failed) || env.sensors().button_pressed {
        s.request_transition(ExitState::Idle);
    }
}

fn set_get(s: &mut ExitSession, arg: &str) {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    let [tid, license_number] = parts.as_slice() else {
        warn!(arg, "set_get expects <tid>,<license_number>");
        return;
    };
    if tid.is_empty() {
        warn!(arg, "set_get needs a transaction id");
        return;
    }
    s.replace_info(json!({ keys::TID: tid, keys::LICENSE_NUMBER: license_number }));
    s.request_transition(ExitState::Get);
}

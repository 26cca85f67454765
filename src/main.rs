//! parkgate daemon.
//!
//! Runs the entrance and exit charts, a controller client per gate, and an
//! interactive simulator on stdin standing in for the OCR and serial
//! workers. Type `help` for the simulator commands.

use anyhow::{bail, Context, Result};
use clap::Parser;
use parkgate::charts::{EntranceChart, ExitChart, GateEnv};
use parkgate::config::GateConfig;
use parkgate::controller::{
    ControllerClient, GateControl, LogActuator, RawReading, RemoteController,
};
use parkgate::core::{Clock, SystemClock};
use parkgate::detector::{Detector, PlateSender};
use parkgate::ledger::MemoryLedger;
use parkgate::notify::LogNotifier;
use parkgate::remote::{MemoryStore, RemoteStore};
use parkgate::runtime::{spawn_worker, StopHandle, Worker};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Parking gate state charts with a stdin simulator
#[derive(Parser, Debug)]
#[command(name = "parkgate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Override engine.tick_ms
    #[arg(long)]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &args.config {
        Some(path) => GateConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GateConfig::default(),
    };
    if let Some(tick_ms) = args.tick_ms {
        config.engine.tick_ms = tick_ms;
        config.validate().context("invalid --tick-ms")?;
    }
    info!(
        entrance = %config.gates.entrance,
        exit = %config.gates.exit,
        tick_ms = config.engine.tick_ms,
        "Starting parkgate"
    );

    let store = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&clock)));
    let stop = StopHandle::new();
    let period = config.tick_period();
    let settings = config.engine_settings();

    let mut sim = Simulator::new(store.clone(), ledger.clone());
    let mut tasks = Vec::new();

    for (gate, kind) in [
        (config.gates.entrance.clone(), GateKind::Entrance),
        (config.gates.exit.clone(), GateKind::Exit),
    ] {
        let (client, readings) = ControllerClient::new(
            &gate,
            store.clone(),
            Arc::clone(&clock),
            config.controller,
            Box::new(LogActuator),
        );
        tasks.push(supervise(spawn_worker(client, period, stop.clone())));

        let (detector, plates) = Detector::new(&gate, store.clone(), Arc::clone(&clock));
        let env = GateEnv::new(
            detector.with_heartbeat_interval(settings.heartbeat),
            Box::new(RemoteController::new(&gate, store.clone())),
            ledger.clone(),
            Arc::new(LogNotifier),
        )
        .with_timeouts(config.timeouts());

        match kind {
            GateKind::Entrance => {
                let chart =
                    EntranceChart::entrance(&gate, env, store.clone(), Arc::clone(&clock), settings)
                        .context("failed to build entrance chart")?;
                tasks.push(supervise(spawn_worker(chart, period, stop.clone())));
            }
            GateKind::Exit => {
                let chart = ExitChart::exit(&gate, env, store.clone(), Arc::clone(&clock), settings)
                    .context("failed to build exit chart")?;
                tasks.push(supervise(spawn_worker(chart, period, stop.clone())));
            }
        }
        sim.attach(gate, plates, readings);
    }

    tokio::select! {
        result = sim.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("Interrupted");
        }
    }

    stop.stop();
    for task in tasks {
        task.await.context("worker task panicked")?;
    }
    info!("Stopped");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum GateKind {
    Entrance,
    Exit,
}

/// Await a worker and report how it ended.
fn supervise<W: Worker>(handle: JoinHandle<W>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match handle.await {
            Ok(worker) => info!(worker = %worker.name(), "Worker finished"),
            Err(err) => error!(error = %err, "Worker failed"),
        }
    })
}

/// One simulator input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Plate { gate: String, plate: String },
    Reading { gate: String, fields: Vec<(String, u32)> },
    Command { path: String, value: String },
    Distance { gate: String, sensor: Sensor, cm: u32 },
    Pay { tid: String },
    List,
    Help,
    Quit,
    Blank,
}

/// Threshold adjustable through `distance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sensor {
    Hover,
    Car,
}

const HELP: &str = "\
plate <gate> <PLATE>              feed a plate read to the gate's detector
reading <gate> key=value ...      update sensors: hover, car (cm), button, barricade, mode (0/1)
cmd <path> <value>                write a remote command, e.g. cmd exit/state/command set_idle
distance <gate> hover|car <cm>    change a controller detection threshold
pay <tid>                         mark a transaction paid
list                              print the ledger
quit                              stop every worker and exit";

fn parse_input(line: &str) -> Result<Input> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Blank);
    };
    let rest: Vec<&str> = words.collect();
    let input = match (verb, rest.as_slice()) {
        ("plate", [gate, plate]) => Input::Plate {
            gate: gate.to_string(),
            plate: plate.to_string(),
        },
        ("reading", [gate, pairs @ ..]) if !pairs.is_empty() => {
            let fields = pairs
                .iter()
                .map(|pair| -> Result<(String, u32)> {
                    let (key, value) = pair
                        .split_once('=')
                        .with_context(|| format!("expected key=value, got '{pair}'"))?;
                    let value = value
                        .parse::<u32>()
                        .with_context(|| format!("invalid number in '{pair}'"))?;
                    Ok((key.to_string(), value))
                })
                .collect::<Result<Vec<_>>>()?;
            Input::Reading {
                gate: gate.to_string(),
                fields,
            }
        }
        ("cmd", [path, value @ ..]) if !value.is_empty() => Input::Command {
            path: path.to_string(),
            value: value.join(" "),
        },
        ("distance", [gate, sensor, cm]) => {
            let sensor = match *sensor {
                "hover" => Sensor::Hover,
                "car" => Sensor::Car,
                other => bail!("unknown sensor '{other}', expected hover or car"),
            };
            let cm = cm
                .parse::<u32>()
                .with_context(|| format!("invalid distance '{cm}'"))?;
            Input::Distance {
                gate: gate.to_string(),
                sensor,
                cm,
            }
        }
        ("pay", [tid]) => Input::Pay {
            tid: tid.to_string(),
        },
        ("list", []) => Input::List,
        ("help", []) => Input::Help,
        ("quit" | "exit", []) => Input::Quit,
        _ => bail!("unrecognized input '{line}', try 'help'"),
    };
    Ok(input)
}

fn apply_field(reading: &mut RawReading, key: &str, value: u32) -> Result<()> {
    match key {
        "hover" => reading.hover_distance_cm = value,
        "car" => reading.car_distance_cm = value,
        "button" => reading.button = value != 0,
        "barricade" => reading.barricade_open = value != 0,
        "mode" => reading.mode = value != 0,
        _ => bail!("unknown reading field '{key}'"),
    }
    Ok(())
}

struct SimGate {
    plates: PlateSender,
    readings: mpsc::UnboundedSender<RawReading>,
    control: RemoteController,
    last: RawReading,
}

/// Stands in for the OCR workers, the serial readers and the payment kiosk.
struct Simulator {
    store: Arc<MemoryStore>,
    ledger: Arc<MemoryLedger>,
    gates: HashMap<String, SimGate>,
}

impl Simulator {
    fn new(store: Arc<MemoryStore>, ledger: Arc<MemoryLedger>) -> Self {
        Self {
            store,
            ledger,
            gates: HashMap::new(),
        }
    }

    fn attach(&mut self, gate: String, plates: PlateSender, readings: mpsc::UnboundedSender<RawReading>) {
        // Nothing near either sensor until told otherwise.
        let last = RawReading {
            hover_distance_cm: u32::MAX,
            car_distance_cm: u32::MAX,
            ..RawReading::default()
        };
        if readings.send(last).is_err() {
            warn!(gate = %gate, "Controller client is gone");
        }
        let control = RemoteController::new(&gate, self.store.clone());
        self.gates.insert(
            gate,
            SimGate {
                plates,
                readings,
                control,
                last,
            },
        );
    }

    async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");
        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            match parse_input(&line) {
                Ok(Input::Quit) => break,
                Ok(input) => {
                    if let Err(err) = self.handle(input) {
                        warn!(error = %err, "Simulator input failed");
                    }
                }
                Err(err) => warn!(error = %err, "Simulator input rejected"),
            }
        }
        Ok(())
    }

    fn gate(&mut self, gate: &str) -> Result<&mut SimGate> {
        self.gates
            .get_mut(gate)
            .with_context(|| format!("unknown gate '{gate}'"))
    }

    fn handle(&mut self, input: Input) -> Result<()> {
        match input {
            Input::Plate { gate, plate } => {
                if !self.gate(&gate)?.plates.send(plate) {
                    bail!("detector of '{gate}' is gone");
                }
            }
            Input::Reading { gate, fields } => {
                let sim = self.gate(&gate)?;
                let mut reading = sim.last;
                for (key, value) in &fields {
                    apply_field(&mut reading, key, *value)?;
                }
                sim.last = reading;
                sim.readings
                    .send(reading)
                    .map_err(|_| anyhow::anyhow!("controller of '{gate}' is gone"))?;
            }
            Input::Command { path, value } => {
                self.store
                    .set(&path, serde_json::Value::String(value))
                    .with_context(|| format!("failed to write {path}"))?;
            }
            Input::Distance { gate, sensor, cm } => {
                let control = &mut self.gate(&gate)?.control;
                match sensor {
                    Sensor::Hover => control.set_hover_distance(cm),
                    Sensor::Car => control.set_car_distance(cm),
                }
            }
            Input::Pay { tid } => {
                self.ledger
                    .mark_paid(&tid)
                    .with_context(|| format!("failed to pay {tid}"))?;
                info!(tid = %tid, "Transaction paid");
            }
            Input::List => {
                for tx in self.ledger.transactions() {
                    println!("{}", serde_json::to_string(&tx)?);
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit | Input::Blank => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkgate::ledger::Ledger;

    #[test]
    fn parses_plate_and_pay() {
        assert_eq!(
            parse_input("plate entrance ABC123").unwrap(),
            Input::Plate {
                gate: "entrance".into(),
                plate: "ABC123".into()
            }
        );
        assert_eq!(
            parse_input("  pay 42 ").unwrap(),
            Input::Pay { tid: "42".into() }
        );
        assert_eq!(parse_input("").unwrap(), Input::Blank);
    }

    #[test]
    fn parses_reading_fields() {
        assert_eq!(
            parse_input("reading exit hover=3 car=90").unwrap(),
            Input::Reading {
                gate: "exit".into(),
                fields: vec![("hover".into(), 3), ("car".into(), 90)],
            }
        );
        assert!(parse_input("reading exit hover").is_err());
        assert!(parse_input("reading exit hover=near").is_err());
        assert!(parse_input("reading exit").is_err());
    }

    #[test]
    fn command_value_keeps_spaces() {
        assert_eq!(
            parse_input("cmd entrance/state/command set_process:AB 12").unwrap(),
            Input::Command {
                path: "entrance/state/command".into(),
                value: "set_process:AB 12".into(),
            }
        );
    }

    #[test]
    fn parses_distance() {
        assert_eq!(
            parse_input("distance exit car 120").unwrap(),
            Input::Distance {
                gate: "exit".into(),
                sensor: Sensor::Car,
                cm: 120,
            }
        );
        assert!(parse_input("distance exit wheel 3").is_err());
        assert!(parse_input("distance exit hover far").is_err());
    }

    #[test]
    fn unknown_reading_field_is_rejected() {
        let mut reading = RawReading::default();
        apply_field(&mut reading, "button", 1).unwrap();
        assert!(reading.button);
        assert!(apply_field(&mut reading, "speed", 1).is_err());
    }

    #[test]
    fn simulator_routes_inputs() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new(Arc::new(SystemClock)));
        let mut sim = Simulator::new(store.clone(), ledger.clone());
        let (detector, plate_sender) = Detector::new("entrance", store.clone(), Arc::new(SystemClock));
        let (reading_tx, mut reading_rx) = mpsc::unbounded_channel();
        sim.attach("entrance".into(), plate_sender, reading_tx);
        assert_eq!(reading_rx.try_recv().unwrap().hover_distance_cm, u32::MAX);

        sim.handle(parse_input("reading entrance hover=2").unwrap()).unwrap();
        let reading = reading_rx.try_recv().unwrap();
        assert_eq!(reading.hover_distance_cm, 2);
        assert_eq!(reading.car_distance_cm, u32::MAX);

        sim.handle(parse_input("cmd entrance/state/command set_idle").unwrap())
            .unwrap();
        assert_eq!(store.value("entrance/state/command"), "set_idle");

        sim.handle(parse_input("distance entrance hover 8").unwrap())
            .unwrap();
        assert_eq!(
            store.value("entrance/controller/command"),
            "set_hover_distance:8"
        );

        let tid = ledger.reserve("ABC123").unwrap();
        sim.handle(Input::Pay { tid: tid.clone() }).unwrap();
        assert!(ledger.is_paid(&tid));

        assert!(sim.handle(parse_input("plate north ABC123").unwrap()).is_err());
        drop(detector);
        assert!(sim.handle(parse_input("plate entrance ABC123").unwrap()).is_err());
    }
}

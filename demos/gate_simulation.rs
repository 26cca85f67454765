//! Entrance Gate Simulation
//!
//! This example drives one entrance chart through a full admission on a
//! manual clock: a plate is read, the driver hovers at the kiosk, the
//! barricade opens, the car passes and the gate cools down back to idle.
//!
//! Key concepts:
//! - Chart and controller client sharing one in-memory remote store
//! - Ticks driven by hand, time advanced by `ManualClock`
//! - The cooldown hold deferring the idle entry
//!
//! Run with: cargo run --example gate_simulation

use parkgate::charts::{EngineSettings, EntranceChart, GateEnv};
use parkgate::controller::{
    Actuator, ActuatorError, ControllerClient, ControllerConfig, RawReading, RemoteController,
};
use parkgate::core::{Clock, ManualClock};
use parkgate::detector::Detector;
use parkgate::ledger::{Ledger, MemoryLedger};
use parkgate::notify::LogNotifier;
use parkgate::remote::MemoryStore;
use std::sync::Arc;

struct PrintingMotor;

impl Actuator for PrintingMotor {
    fn open(&mut self) -> Result<(), ActuatorError> {
        println!("  [barricade] open");
        Ok(())
    }

    fn close(&mut self) -> Result<(), ActuatorError> {
        println!("  [barricade] close");
        Ok(())
    }
}

fn reading(hover_cm: u32, car_cm: u32) -> RawReading {
    RawReading {
        hover_distance_cm: hover_cm,
        car_distance_cm: car_cm,
        ..RawReading::default()
    }
}

fn main() {
    println!("=== Entrance Gate Simulation ===\n");

    let store = Arc::new(MemoryStore::new());
    let manual = ManualClock::new();
    let clock: Arc<dyn Clock> = Arc::new(manual.clone());
    let ledger = Arc::new(MemoryLedger::new(Arc::clone(&clock)));

    let (mut client, readings) = ControllerClient::new(
        "entrance",
        store.clone(),
        Arc::clone(&clock),
        ControllerConfig::default(),
        Box::new(PrintingMotor),
    );
    let (detector, plates) = Detector::new("entrance", store.clone(), Arc::clone(&clock));
    let env = GateEnv::new(
        detector,
        Box::new(RemoteController::new("entrance", store.clone())),
        ledger.clone(),
        Arc::new(LogNotifier),
    );
    let mut chart = EntranceChart::entrance(
        "entrance",
        env,
        store.clone(),
        Arc::clone(&clock),
        EngineSettings::default(),
    )
    .expect("entrance chart is well formed");

    client.start();
    chart.start();

    let mut step = |label: &str, n: usize| {
        for _ in 0..n {
            client.sync();
            chart.tick();
        }
        println!(
            "{label:<28} state={}",
            store.value("entrance/state/status")["current_state"]
        );
    };

    let send = |r: RawReading| readings.send(r).expect("controller client is alive");
    send(reading(100, 400));
    step("Started", 2);

    plates.send("ABC123");
    step("Plate ABC123 read", 2);

    send(reading(2, 400));
    step("Driver at kiosk", 5);

    send(reading(100, 50));
    step("Car under barricade", 2);
    send(reading(100, 400));
    step("Car gone", 2);

    manual.advance_secs(5);
    step("Clearance elapsed", 2);
    manual.advance_secs(5);
    step("Cooldown elapsed", 2);

    println!("\nLedger:");
    for tx in ledger.transactions() {
        println!("  {} {} paid={}", tx.tid, tx.license_number, ledger.is_paid(&tx.tid));
    }

    println!("\n=== Example Complete ===");
}

//! Plate detection facade.
//!
//! The OCR worker runs on its own and pushes every plate it reads into a
//! [`PlateSender`]. The chart side holds the [`Detector`], which drains that
//! channel without blocking, counts occurrences in a [`DetectionSet`] and
//! syncs its view to `<gate>/alpr`.

use crate::core::Clock;
use crate::remote::{
    CommandChannel, CommandTable, Handler, Heartbeat, Namespace, RemoteStore, StatusPublisher,
};
use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Remote component name of the detector facade.
pub const DETECTOR_COMPONENT: &str = "alpr";

/// Occurrence counts of plates seen since the last clear.
///
/// Plates keep the order in which they were first seen.
///
/// ```rust
/// use parkgate::detector::DetectionSet;
///
/// let mut set = DetectionSet::new();
/// set.record("ABC123");
/// set.record("XYZ999");
/// set.record("XYZ999");
/// assert_eq!(set.candidate(), Some("XYZ999"));
/// assert_eq!(set.plates(), vec!["ABC123", "XYZ999"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionSet {
    counts: Vec<(String, u32)>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more sighting. Blank plates are ignored.
    pub fn record(&mut self, plate: &str) {
        let plate = plate.trim();
        if plate.is_empty() {
            return;
        }
        match self.counts.iter_mut().find(|(seen, _)| seen == plate) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((plate.to_string(), 1)),
        }
    }

    /// The most frequently seen plate. Ties go to the one seen first.
    pub fn candidate(&self) -> Option<&str> {
        let mut best: Option<&(String, u32)> = None;
        for entry in &self.counts {
            if best.map_or(true, |(_, top)| entry.1 > *top) {
                best = Some(entry);
            }
        }
        best.map(|(plate, _)| plate.as_str())
    }

    /// Distinct plates in first-seen order.
    pub fn plates(&self) -> Vec<&str> {
        self.counts.iter().map(|(plate, _)| plate.as_str()).collect()
    }

    pub fn count(&self, plate: &str) -> u32 {
        self.counts
            .iter()
            .find(|(seen, _)| seen == plate)
            .map_or(0, |(_, count)| *count)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Producer handle given to the OCR worker.
#[derive(Debug, Clone)]
pub struct PlateSender {
    tx: mpsc::UnboundedSender<String>,
}

impl PlateSender {
    /// Returns `false` once the detector has been dropped.
    pub fn send(&self, plate: impl Into<String>) -> bool {
        self.tx.send(plate.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Chart-side view of one gate's plate detector.
pub struct Detector {
    namespace: Namespace,
    plates: mpsc::UnboundedReceiver<String>,
    set: DetectionSet,
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    status: StatusPublisher,
    heartbeat: Heartbeat,
    channel: CommandChannel,
    commands: CommandTable<DetectionSet>,
    running: bool,
}

impl Detector {
    /// Create the facade for `gate` and the sender its worker writes to.
    pub fn new(gate: &str, store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> (Self, PlateSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let namespace = Namespace::new(gate, DETECTOR_COMPONENT);
        let commands = CommandTable::new().with(
            "clear",
            Handler::unit(|set: &mut DetectionSet| {
                info!("Clear ALPR");
                set.clear();
            }),
        );
        let detector = Self {
            status: StatusPublisher::new(namespace.status()),
            heartbeat: Heartbeat::new(
                namespace.heartbeat(),
                Duration::seconds(Heartbeat::DEFAULT_INTERVAL_SECS),
            ),
            channel: CommandChannel::new(&namespace),
            namespace,
            plates: rx,
            set: DetectionSet::new(),
            store,
            clock,
            commands,
            running: false,
        };
        (detector, PlateSender { tx })
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat = Heartbeat::new(self.namespace.heartbeat(), interval);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Announce the detector remotely and begin accepting plates.
    pub fn start(&mut self) {
        if self.running {
            warn!(detector = %self.namespace, "Detector is already running");
            return;
        }
        info!(detector = %self.namespace, "Detector starting");
        self.running = true;
        let store = Arc::clone(&self.store);
        self.status.publish(&*store, &self.status_view());
        self.heartbeat.force(&*store, self.clock.now());
        self.channel.clear(&*store);
    }

    pub fn stop(&mut self) {
        if self.running {
            info!(detector = %self.namespace, "Detector stopping");
            self.running = false;
            self.plates.close();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Drain pending plates, publish, heartbeat and run one remote command.
    ///
    /// Never waits on the worker.
    pub fn sync(&mut self) {
        if !self.running {
            return;
        }
        let drained = self.drain();
        if drained > 0 {
            debug!(detector = %self.namespace, drained, "Plates received");
        }
        let store = Arc::clone(&self.store);
        self.status.publish_if_changed(&*store, &self.status_view());
        self.heartbeat.beat(&*store, self.clock.now());
        self.channel.poll(&*store, &self.commands, &mut self.set);
    }

    fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            match self.plates.try_recv() {
                Ok(plate) => {
                    self.set.record(&plate);
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return drained,
            }
        }
    }

    /// Forget every plate seen so far.
    pub fn clear(&mut self) {
        info!(detector = %self.namespace, "Clear ALPR");
        self.set.clear();
    }

    pub fn has_candidate(&self) -> bool {
        self.set.candidate().is_some()
    }

    /// The most frequently seen plate, or an empty string.
    pub fn candidate(&self) -> String {
        self.set.candidate().unwrap_or_default().to_string()
    }

    /// Distinct plates seen since the last clear, in first-seen order.
    pub fn candidates(&self) -> Vec<String> {
        self.set.plates().into_iter().map(str::to_string).collect()
    }

    fn status_view(&self) -> serde_json::Value {
        json!({
            "candidate_key": self.candidate(),
            "license_numbers": self.set.plates(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::remote::MemoryStore;

    fn detector() -> (Detector, PlateSender, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (mut detector, sender) =
            Detector::new("entrance", store.clone(), Arc::new(ManualClock::new()));
        detector.start();
        (detector, sender, store)
    }

    #[test]
    fn candidate_prefers_highest_count_then_first_seen() {
        let mut set = DetectionSet::new();
        assert_eq!(set.candidate(), None);

        set.record("AAA111");
        set.record("BBB222");
        assert_eq!(set.candidate(), Some("AAA111"));

        set.record("BBB222");
        assert_eq!(set.candidate(), Some("BBB222"));
        assert_eq!(set.count("BBB222"), 2);
        assert_eq!(set.count("CCC333"), 0);
    }

    #[test]
    fn blank_plates_are_ignored() {
        let mut set = DetectionSet::new();
        set.record("   ");
        assert!(set.is_empty());
    }

    #[test]
    fn sync_drains_and_publishes() {
        let (mut detector, sender, store) = detector();
        assert_eq!(store.value("entrance/alpr/status")["candidate_key"], "");

        assert!(sender.send("ABC123"));
        assert!(sender.send("ABC123"));
        assert!(sender.send("XYZ999"));
        assert!(!detector.has_candidate());

        detector.sync();

        assert!(detector.has_candidate());
        assert_eq!(detector.candidate(), "ABC123");
        assert_eq!(detector.candidates(), vec!["ABC123", "XYZ999"]);
        let status = store.value("entrance/alpr/status");
        assert_eq!(status["candidate_key"], "ABC123");
        assert_eq!(status["license_numbers"], json!(["ABC123", "XYZ999"]));
    }

    #[test]
    fn remote_clear_command_empties_set() {
        let (mut detector, sender, store) = detector();
        sender.send("ABC123");
        detector.sync();

        store.set("entrance/alpr/command", json!("clear")).unwrap();
        detector.sync();

        assert!(!detector.has_candidate());
        assert_eq!(store.value("entrance/alpr/command"), json!(""));
        detector.sync();
        assert_eq!(store.value("entrance/alpr/status")["candidate_key"], "");
    }

    #[test]
    fn stopped_detector_closes_channel() {
        let (mut detector, sender, _) = detector();
        detector.stop();
        assert!(!sender.send("ABC123"));
        detector.sync();
        assert!(!detector.has_candidate());
    }
}

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use obdwatch::session::events::{ConnectionChange, LogEntry, Observers};
use obdwatch::session::fake::FakeNetwork;
use obdwatch::session::{ConnectionManager, ManualScheduler, SessionSettings};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("obdwatch.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// A serial_data frame as the backend sends it
#[allow(dead_code)]
pub fn serial_frame(raw: &str) -> String {
    serde_json::json!({
        "type": "serial_data",
        "data": {"timestamp": "2024-05-01T10:00:00", "data": raw},
    })
    .to_string()
}

/// Everything the observers saw, in order
#[allow(dead_code)]
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    samples: Arc<Mutex<Vec<String>>>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    changes: Arc<Mutex<Vec<ConnectionChange>>>,
    sounds: Arc<Mutex<usize>>,
}

#[allow(dead_code)]
impl Recorded {
    pub fn attach(&self, observers: &mut Observers) {
        let samples = self.samples.clone();
        observers.on_sample_added(move |s| samples.lock().unwrap().push(s.raw().to_string()));
        let logs = self.logs.clone();
        observers.on_log_entry(move |e| logs.lock().unwrap().push(e.clone()));
        let changes = self.changes.clone();
        observers.on_connection_change(move |c| changes.lock().unwrap().push(c.clone()));
        let sounds = self.sounds.clone();
        observers.on_notification_sound(move || *sounds.lock().unwrap() += 1);
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.lock().unwrap().clone()
    }

    pub fn samples(&self) -> Vec<String> {
        self.samples.lock().unwrap().clone()
    }

    pub fn changes(&self) -> Vec<ConnectionChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn sounds(&self) -> usize {
        *self.sounds.lock().unwrap()
    }
}

/// A manager over a fake network and a manual clock, with recording observers
#[allow(dead_code)]
pub fn session(
    settings: SessionSettings,
) -> (ConnectionManager, FakeNetwork, ManualScheduler, Recorded) {
    let network = FakeNetwork::new();
    let clock = ManualScheduler::new();
    let mut manager = ConnectionManager::new(
        settings,
        Box::new(network.connector()),
        Box::new(clock.clone()),
    )
    .expect("valid settings");
    let recorded = Recorded::default();
    recorded.attach(manager.observers_mut());
    (manager, network, clock, recorded)
}

/// Connect and complete the handshake on the attempted channel
#[allow(dead_code)]
pub fn open(manager: &mut ConnectionManager, network: &FakeNetwork) {
    manager.connect();
    let id = network.last_attempt().expect("connect attempt");
    manager.on_channel_opened(id, network.channel(id));
}

/// Advance the clock and deliver every fired timer
#[allow(dead_code)]
pub fn advance(manager: &mut ConnectionManager, clock: &ManualScheduler, by: Duration) {
    for id in clock.advance(by) {
        manager.on_timer(id);
    }
}

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::parser::parse_registers;
use super::source::RegisterSource;
use super::Reading;
use crate::core::config::{clamp_frequency, clamp_sensor_count, Config};
use crate::core::error::AcquisitionError;
use crate::core::event_bus::{EventBus, VotingEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct AcquisitionSettings {
    pub num_sensors: usize,
    pub reading_frequency_secs: f64,
    pub start_address: u16,
    pub error_value: i32,
    pub scale_factor: f64,
}

impl AcquisitionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            num_sensors: clamp_sensor_count(config.sensors.num_sensors),
            reading_frequency_secs: clamp_frequency(config.sensors.reading_frequency_secs),
            start_address: config.acquisition.start_address,
            error_value: config.acquisition.error_value,
            scale_factor: config.sensors.scale_factor,
        }
    }
}

/// Polls a register source on its own task and hands each sanitized tick to
/// the consumer through an unbounded queue.
pub struct AcquisitionService {
    settings: Arc<RwLock<AcquisitionSettings>>,
    state_tx: watch::Sender<RunState>,
    connected: Arc<AtomicBool>,
    events: Option<Arc<EventBus>>,
    handle: Option<JoinHandle<()>>,
}

impl AcquisitionService {
    pub fn new(settings: AcquisitionSettings) -> Self {
        let (state_tx, _) = watch::channel(RunState::Stopped);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            state_tx,
            connected: Arc::new(AtomicBool::new(false)),
            events: None,
            handle: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn start<S>(&mut self, source: S, sender: mpsc::UnboundedSender<Vec<Reading>>)
    where
        S: RegisterSource + 'static,
    {
        if self.handle.as_ref().map_or(false, |h| !h.is_finished()) {
            warn!("Acquisition already running");
            return;
        }

        self.set_state(RunState::Running);
        let worker = Worker {
            settings: self.settings.clone(),
            state_rx: self.state_tx.subscribe(),
            connected: self.connected.clone(),
            sender,
        };
        self.handle = Some(tokio::spawn(worker.run(source)));
        info!("Acquisition task started");
    }

    pub fn pause(&self) {
        self.set_state(RunState::Paused);
        debug!("Acquisition paused");
    }

    pub fn resume(&self) {
        self.set_state(RunState::Running);
        debug!("Acquisition resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.state_tx.borrow() == RunState::Paused
    }

    pub fn state(&self) -> RunState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Signals the task to finish and waits up to two seconds for it.
    pub async fn stop(&mut self) {
        self.set_state(RunState::Stopped);

        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle)
                .await
                .is_err()
            {
                warn!("Acquisition task did not stop in time, aborting");
                handle.abort();
            }
        }
        info!("Acquisition stopped");
    }

    /// Returns the period actually applied after clamping.
    pub async fn update_reading_frequency(&self, secs: f64) -> f64 {
        let applied = clamp_frequency(secs);
        self.settings.write().await.reading_frequency_secs = applied;
        debug!("Reading period updated to {}s", applied);
        applied
    }

    /// Returns the sensor count actually applied after clamping.
    pub async fn update_num_sensors(&self, count: usize) -> usize {
        let applied = clamp_sensor_count(count);
        self.settings.write().await.num_sensors = applied;
        debug!("Number of sensors updated to {}", applied);
        applied
    }

    pub async fn num_sensors(&self) -> usize {
        self.settings.read().await.num_sensors
    }

    pub async fn reading_frequency(&self) -> f64 {
        self.settings.read().await.reading_frequency_secs
    }

    fn set_state(&self, state: RunState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            if let Some(events) = &self.events {
                events.publish(VotingEvent::acquisition_state_changed(state));
            }
        }
    }
}

struct Worker {
    settings: Arc<RwLock<AcquisitionSettings>>,
    state_rx: watch::Receiver<RunState>,
    connected: Arc<AtomicBool>,
    sender: mpsc::UnboundedSender<Vec<Reading>>,
}

impl Worker {
    async fn run<S: RegisterSource>(mut self, mut source: S) {
        if let Err(e) = source.connect().await {
            error!("Failed to connect to {}: {}", source.describe(), e);
            return;
        }
        self.connected.store(true, Ordering::Relaxed);
        info!("Connected to {}", source.describe());

        while self.wait_until_running().await {
            let settings = self.settings.read().await.clone();

            match source
                .read_registers(settings.start_address, settings.num_sensors)
                .await
            {
                Ok(raw) => {
                    let readings =
                        parse_registers(&raw, settings.error_value, settings.scale_factor);
                    if self.sender.send(readings).is_err() {
                        warn!("Tick consumer dropped, stopping acquisition");
                        break;
                    }
                }
                Err(AcquisitionError::Exhausted) => {
                    info!("{} has no more data", source.describe());
                    break;
                }
                Err(e) => warn!("Error reading registers: {}", e),
            }

            let period = Duration::from_secs_f64(settings.reading_frequency_secs);
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        source.disconnect().await;
        self.connected.store(false, Ordering::Relaxed);
        debug!("Acquisition task finished");
    }

    /// Blocks while paused. `false` once stopped or the service is gone.
    async fn wait_until_running(&mut self) -> bool {
        loop {
            let state = *self.state_rx.borrow_and_update();
            match state {
                RunState::Running => return true,
                RunState::Stopped => return false,
                RunState::Paused => {
                    if self.state_rx.changed().await.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

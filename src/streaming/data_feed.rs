use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::metrics::PerformanceMetrics;
use crate::acquisition::{filter_valid, is_plausible, Reading};
use crate::core::config::{clamp_frequency, clamp_sensor_count, Config, VotingConfig, MAX_SENSORS};
use crate::core::error::TickError;
use crate::core::event_bus::{EventBus, VotingEvent};
use crate::core::health::HealthChecker;
use crate::monitoring::TickHistory;
use crate::strategy::{SensorTransition, StrategyKind, VoteResults, Voter, VotingStrategy};

/// Requests applied between ticks, on the task that owns the voter.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    SetStrategies(Vec<StrategyKind>),
    Toggle(StrategyKind, bool),
    Reset,
    SetSensorCount(usize),
    SetReadingFrequency(f64),
    SetSmoothingFactor(f64),
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub tick: u64,
    pub readings: Vec<Reading>,
    pub valid_readings: usize,
    pub results: VoteResults,
    /// Sensor indices refer to positions in `readings`.
    pub transitions: Vec<SensorTransition>,
    pub timestamp: DateTime<Utc>,
}

/// Consumer side of the acquisition queue: validates each tick, votes on
/// it and fans the outcome out to history, events and health.
pub struct DataFeed {
    voter: Voter,
    voting_config: VotingConfig,
    parked: HashMap<StrategyKind, VotingStrategy>,
    sensor_count: usize,
    tick: u64,
    history: Arc<RwLock<TickHistory>>,
    latest: Arc<RwLock<Option<TickOutcome>>>,
    metrics: Arc<PerformanceMetrics>,
    events: Arc<EventBus>,
    health: Option<HealthChecker>,
}

impl DataFeed {
    pub fn new(config: &Config, events: Arc<EventBus>) -> Self {
        let sensor_count = clamp_sensor_count(config.sensors.num_sensors);
        let voter = Voter::new(VotingStrategy::all_from_config(&config.voting, MAX_SENSORS));

        Self {
            voter,
            voting_config: config.voting.clone(),
            parked: HashMap::new(),
            sensor_count,
            tick: 0,
            history: Arc::new(RwLock::new(TickHistory::new(
                sensor_count,
                config.sensors.reading_frequency_secs,
                config.monitoring.smoothing_factor,
            ))),
            latest: Arc::new(RwLock::new(None)),
            metrics: Arc::new(PerformanceMetrics::new()),
            events,
            health: None,
        }
    }

    pub fn with_health(mut self, health: HealthChecker) -> Self {
        self.health = Some(health);
        self
    }

    pub fn voter(&self) -> &Voter {
        &self.voter
    }

    pub fn sensor_count(&self) -> usize {
        self.sensor_count
    }

    pub fn history_handle(&self) -> Arc<RwLock<TickHistory>> {
        self.history.clone()
    }

    pub fn latest_handle(&self) -> Arc<RwLock<Option<TickOutcome>>> {
        self.latest.clone()
    }

    pub fn metrics_handle(&self) -> Arc<PerformanceMetrics> {
        self.metrics.clone()
    }

    pub fn validate(&self, readings: &[Reading]) -> Result<(), TickError> {
        if readings.is_empty() {
            return Err(TickError::Empty);
        }
        if readings.len() != self.sensor_count {
            return Err(TickError::LengthMismatch {
                expected: self.sensor_count,
                actual: readings.len(),
            });
        }
        Ok(())
    }

    pub async fn process(&mut self, readings: Vec<Reading>) -> Result<TickOutcome, TickError> {
        self.metrics.increment_ticks_received();

        if let Err(e) = self.validate(&readings) {
            self.metrics.increment_ticks_rejected();
            warn!("Dropping tick: {}", e);
            self.events.publish(VotingEvent::TickRejected {
                reason: e.to_string(),
                timestamp: Utc::now(),
            });
            return Err(e);
        }

        let valid = filter_valid(&readings);
        self.metrics.add_null_readings(readings.len() - valid.len());

        let implausible = valid.iter().filter(|&&reading| !is_plausible(reading)).count();
        if implausible > 0 {
            self.metrics.add_implausible_readings(implausible);
            debug!("{} readings outside the plausible range", implausible);
        }

        let started = Instant::now();
        let results = self.voter.vote(&valid);
        self.metrics.record_vote(started.elapsed());

        // The adaptive strategy indexes the filtered vector; map back to sensors.
        let sensors: Vec<usize> = readings
            .iter()
            .enumerate()
            .filter_map(|(i, reading)| reading.map(|_| i))
            .collect();
        let transitions: Vec<SensorTransition> = self
            .voter
            .adaptive()
            .map(|adaptive| {
                adaptive
                    .last_transitions()
                    .iter()
                    .map(|t| t.map_sensor(|pos| sensors.get(pos).copied().unwrap_or(pos)))
                    .collect()
            })
            .unwrap_or_default();
        let timestamp = Utc::now();
        for transition in &transitions {
            self.events.publish(match *transition {
                SensorTransition::Quarantined(sensor) => {
                    VotingEvent::SensorQuarantined { sensor, timestamp }
                }
                SensorTransition::Recovered(sensor) => {
                    VotingEvent::SensorRecovered { sensor, timestamp }
                }
            });
        }

        self.tick += 1;
        debug!(tick = self.tick, valid = valid.len(), ?results, "tick voted");

        self.history.write().await.record(&readings, &results);

        let outcome = TickOutcome {
            tick: self.tick,
            readings,
            valid_readings: valid.len(),
            results,
            transitions,
            timestamp,
        };
        *self.latest.write().await = Some(outcome.clone());

        self.events.publish(VotingEvent::TickVoted {
            tick: outcome.tick,
            valid_readings: outcome.valid_readings,
            results: outcome.results.clone(),
            timestamp,
        });
        if let Some(health) = &self.health {
            health.record_tick().await;
        }

        Ok(outcome)
    }

    pub async fn apply(&mut self, command: FeedCommand) {
        match command {
            FeedCommand::SetStrategies(kinds) => self.set_strategies(&kinds),
            FeedCommand::Toggle(kind, enabled) => self.toggle(kind, enabled),
            FeedCommand::Reset => self.reset().await,
            FeedCommand::SetSensorCount(count) => {
                self.sensor_count = clamp_sensor_count(count);
                self.history.write().await.set_num_sensors(self.sensor_count);
                self.reset().await;
                info!("Sensor count set to {}", self.sensor_count);
            }
            FeedCommand::SetReadingFrequency(secs) => {
                let secs = clamp_frequency(secs);
                self.history.write().await.set_reading_frequency(secs);
                info!("Reading period set to {}s", secs);
            }
            FeedCommand::SetSmoothingFactor(factor) => {
                self.history.write().await.set_smoothing_factor(factor);
            }
            FeedCommand::Shutdown => {}
        }
    }

    /// Disabled strategies are parked, so re-enabling one resumes its
    /// sensor health state. Its historical result does not survive.
    pub fn toggle(&mut self, kind: StrategyKind, enabled: bool) {
        if enabled {
            if self.voter.contains(kind) {
                return;
            }
            let strategy = self.parked.remove(&kind).unwrap_or_else(|| {
                VotingStrategy::from_config(kind, &self.voting_config, MAX_SENSORS)
            });
            self.voter.add_strategy(strategy);
        } else if let Some(strategy) = self.voter.remove_strategy(kind) {
            self.parked.insert(kind, strategy);
        }
    }

    pub fn set_strategies(&mut self, kinds: &[StrategyKind]) {
        for active in self.voter.kinds() {
            if !kinds.contains(&active) {
                self.toggle(active, false);
            }
        }
        for kind in kinds {
            self.toggle(*kind, true);
        }
    }

    pub async fn reset(&mut self) {
        self.voter.reset();
        for strategy in self.parked.values_mut() {
            strategy.reset();
        }
        self.tick = 0;
        self.history.write().await.clear();
        *self.latest.write().await = None;

        let session_id = match &self.health {
            Some(health) => health.new_session().await,
            None => Uuid::new_v4(),
        };
        info!(%session_id, "Voter reset");
        self.events.publish(VotingEvent::VoterReset {
            session_id,
            timestamp: Utc::now(),
        });
    }

    /// Drives the feed until the tick queue closes or `Shutdown` arrives.
    pub async fn run(
        mut self,
        mut ticks: mpsc::UnboundedReceiver<Vec<Reading>>,
        mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    ) -> Arc<PerformanceMetrics> {
        info!("Data feed running with {} sensors", self.sensor_count);
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                command = commands.recv(), if commands_open => match command {
                    Some(FeedCommand::Shutdown) => break,
                    Some(command) => {
                        let discards_queue = matches!(
                            command,
                            FeedCommand::Reset | FeedCommand::SetSensorCount(_)
                        );
                        self.apply(command).await;
                        if discards_queue {
                            let mut dropped = 0;
                            while ticks.try_recv().is_ok() {
                                dropped += 1;
                            }
                            if dropped > 0 {
                                debug!("Discarded {} queued ticks from the previous session", dropped);
                            }
                        }
                    }
                    None => commands_open = false,
                },
                tick = ticks.recv() => match tick {
                    Some(readings) => {
                        if let Err(e) = self.process(readings).await {
                            debug!("Tick not voted: {}", e);
                        }
                    }
                    None => {
                        info!("Tick queue closed");
                        break;
                    }
                },
            }
        }

        self.metrics.clone()
    }
}

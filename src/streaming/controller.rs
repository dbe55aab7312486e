use tokio::sync::mpsc;
use tracing::{info, warn};

use super::data_feed::FeedCommand;
use crate::acquisition::{AcquisitionService, Reading, RegisterSource, RunState};
use crate::strategy::StrategyKind;

/// Single entry point for runtime changes that touch both ends of the
/// hand-off queue, so acquisition and tick processing never disagree on
/// sensor count or reading period.
pub struct PipelineController {
    acquisition: AcquisitionService,
    commands: mpsc::UnboundedSender<FeedCommand>,
}

impl PipelineController {
    pub fn new(
        acquisition: AcquisitionService,
        commands: mpsc::UnboundedSender<FeedCommand>,
    ) -> Self {
        Self {
            acquisition,
            commands,
        }
    }

    pub fn acquisition(&self) -> &AcquisitionService {
        &self.acquisition
    }

    pub fn start<S>(&mut self, source: S, ticks: mpsc::UnboundedSender<Vec<Reading>>)
    where
        S: RegisterSource + 'static,
    {
        self.acquisition.start(source, ticks);
    }

    pub fn pause(&self) {
        self.acquisition.pause();
    }

    pub fn resume(&self) {
        self.acquisition.resume();
    }

    pub fn state(&self) -> RunState {
        self.acquisition.state()
    }

    /// Returns the period actually applied after clamping.
    pub async fn set_reading_frequency(&self, secs: f64) -> f64 {
        let applied = self.acquisition.update_reading_frequency(secs).await;
        self.send(FeedCommand::SetReadingFrequency(applied));
        applied
    }

    /// Returns the sensor count actually applied. Starts a new voting session.
    pub async fn set_num_sensors(&self, count: usize) -> usize {
        let applied = self.acquisition.update_num_sensors(count).await;
        self.send(FeedCommand::SetSensorCount(applied));
        applied
    }

    pub fn set_smoothing_factor(&self, factor: f64) {
        self.send(FeedCommand::SetSmoothingFactor(factor));
    }

    pub fn set_strategies(&self, kinds: Vec<StrategyKind>) {
        self.send(FeedCommand::SetStrategies(kinds));
    }

    pub fn toggle(&self, kind: StrategyKind, enabled: bool) {
        self.send(FeedCommand::Toggle(kind, enabled));
    }

    pub fn reset(&self) {
        self.send(FeedCommand::Reset);
    }

    /// Stops acquisition first so no tick races the shutdown request.
    pub async fn shutdown(mut self) {
        self.acquisition.stop().await;
        self.send(FeedCommand::Shutdown);
        info!("Pipeline shut down");
    }

    fn send(&self, command: FeedCommand) {
        if let Err(e) = self.commands.send(command) {
            warn!("Tick processor gone, dropping {:?}", e.0);
        }
    }
}

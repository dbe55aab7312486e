use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use warp::Filter;

use sensor_fusion_voter::acquisition::{
    AcquisitionService, AcquisitionSettings, ReplaySource, RunState, SimulatedSource,
    SimulationConfig,
};
use sensor_fusion_voter::core::config::SourceKind;
use sensor_fusion_voter::core::{logging, Config, EventBus, HealthChecker, VotingEvent};
use sensor_fusion_voter::streaming::{DataFeed, PipelineController, TickOutcome};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::var("VOTER_CONFIG") {
        Ok(path) => Config::load(path)?,
        Err(_) => Config::from_env()?,
    };

    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("Sensor fusion voter starting");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "{} sensors every {}s, strategies: {:?}",
        config.sensors.num_sensors,
        config.sensors.reading_frequency_secs,
        config.voting.strategies
    );

    let events = Arc::new(EventBus::new(config.monitoring.event_capacity));
    let health = HealthChecker::new();

    let feed = DataFeed::new(&config, events.clone()).with_health(health.clone());
    let history = feed.history_handle();
    let latest = feed.latest_handle();
    log_enabled_strategies(&config, &feed);

    tokio::spawn(log_events(events.clone(), health.clone()));

    let health_port = config.monitoring.health_port;
    tokio::spawn(start_health_server(health.clone(), latest, health_port));
    tracing::info!("Health endpoint running on port {}", health_port);

    let (tick_tx, tick_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let feed_task = tokio::spawn(feed.run(tick_rx, cmd_rx));

    let acquisition =
        AcquisitionService::new(AcquisitionSettings::from_config(&config)).with_events(events);
    let mut controller = PipelineController::new(acquisition, cmd_tx);
    match config.acquisition.source {
        SourceKind::Simulated => {
            let simulation =
                SimulationConfig::from_settings(&config.acquisition, &config.sensors);
            controller.start(SimulatedSource::new(simulation), tick_tx);
        }
        SourceKind::Replay => {
            let path = config
                .acquisition
                .replay_path
                .clone()
                .context("replay source selected but no replay_path configured")?;
            controller.start(
                ReplaySource::from_file(path, config.acquisition.replay_loop),
                tick_tx,
            );
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    tracing::info!("Shutdown requested");

    controller.shutdown().await;
    let metrics = feed_task.await.context("joining tick processor")?;
    metrics.log_report();

    if let Some(path) = &config.monitoring.export_path {
        match history.read().await.export_csv(path).await {
            Ok(()) => tracing::info!("History written to {}", path),
            Err(e) => tracing::error!("History export failed: {}", e),
        }
    }

    Ok(())
}

fn log_enabled_strategies(config: &Config, feed: &DataFeed) {
    for kind in feed.voter().kinds() {
        tracing::debug!(strategy = kind.display_name(), "strategy enabled");
    }
    if feed.voter().kinds().is_empty() {
        tracing::warn!(
            "No voting strategies enabled (configured: {:?})",
            config.voting.strategies
        );
    }
}

async fn log_events(events: Arc<EventBus>, health: HealthChecker) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(VotingEvent::AcquisitionStateChanged { state, .. }) => {
                tracing::info!("Acquisition {:?}", state);
                health
                    .update_component("acquisition", state == RunState::Running)
                    .await;
            }
            Ok(VotingEvent::SensorQuarantined { sensor, .. }) => {
                tracing::warn!("Sensor {} excluded from adaptive voting", sensor + 1);
            }
            Ok(VotingEvent::SensorRecovered { sensor, .. }) => {
                tracing::info!("Sensor {} back in adaptive voting", sensor + 1);
            }
            Ok(VotingEvent::VoterReset { session_id, .. }) => {
                tracing::info!(%session_id, "New voting session");
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Event logger lagged, skipped {} events", skipped);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn start_health_server(
    health_checker: HealthChecker,
    latest: Arc<RwLock<Option<TickOutcome>>>,
    port: u16,
) {
    let health = warp::path("health")
        .and(warp::get())
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let latest = warp::path("latest")
        .and(warp::get())
        .and(warp::any().map(move || latest.clone()))
        .and_then(|latest: Arc<RwLock<Option<TickOutcome>>>| async move {
            let outcome = latest.read().await.clone();
            Ok::<_, warp::Rejection>(warp::reply::json(&outcome))
        });

    warp::serve(health.or(latest)).run(([0, 0, 0, 0], port)).await;
}

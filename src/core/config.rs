use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::strategy::StrategyKind;

pub const MIN_SENSORS: usize = 1;
pub const MAX_SENSORS: usize = 6;
pub const MIN_READING_FREQUENCY: f64 = 0.1;
pub const MAX_READING_FREQUENCY: f64 = 10.0;
pub const MIN_SMOOTHING_FACTOR: f64 = 0.05;
pub const MAX_SMOOTHING_FACTOR: f64 = 1.0;

/// Register value a sensor reports when it has no valid measurement.
pub const DEFAULT_ERROR_VALUE: i32 = -2731;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub acquisition: AcquisitionConfig,
    pub sensors: SensorConfig,
    pub voting: VotingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Simulated,
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub source: SourceKind,
    pub replay_path: Option<String>,
    pub replay_loop: bool,
    pub start_address: u16,
    pub error_value: i32,
    pub faulty_sensor: Option<usize>,
    pub dropout_every: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Simulated,
            replay_path: None,
            replay_loop: true,
            start_address: 0,
            error_value: DEFAULT_ERROR_VALUE,
            faulty_sensor: None,
            dropout_every: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub num_sensors: usize,
    pub reading_frequency_secs: f64,
    pub scale_factor: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            num_sensors: MAX_SENSORS,
            reading_frequency_secs: 1.0,
            scale_factor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// M-out-of-N: two readings closer than this are the same value.
    pub threshold: f64,
    /// M-out-of-N: how far the fallback reading may sit from the last result.
    pub history_threshold: f64,
    /// Majority: widest gap from the chain anchor.
    pub majority_threshold: f64,
    pub max_error_count: i32,
    pub deviation_threshold: f64,
    pub strategies: Vec<StrategyKind>,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            history_threshold: 0.5,
            majority_threshold: 1.0,
            max_error_count: 2,
            deviation_threshold: 1.0,
            strategies: StrategyKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub health_port: u16,
    pub smoothing_factor: f64,
    pub export_path: Option<String>,
    pub event_capacity: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            health_port: 3000,
            smoothing_factor: 1.0,
            export_path: None,
            event_capacity: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let strategies = match env::var("VOTING_STRATEGIES") {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<StrategyKind>)
                .collect::<Result<Vec<_>, _>>()
                .context("parsing VOTING_STRATEGIES")?,
            Err(_) => defaults.voting.strategies.clone(),
        };

        Ok(Config {
            acquisition: AcquisitionConfig {
                source: match env::var("ACQUISITION_SOURCE")
                    .unwrap_or_else(|_| "simulated".to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "replay" => SourceKind::Replay,
                    _ => SourceKind::Simulated,
                },
                replay_path: env::var("REPLAY_PATH").ok(),
                replay_loop: parse_env("REPLAY_LOOP", defaults.acquisition.replay_loop),
                start_address: parse_env("START_ADDRESS", defaults.acquisition.start_address),
                error_value: parse_env("SENSOR_ERROR_VALUE", defaults.acquisition.error_value),
                faulty_sensor: env::var("SIMULATED_FAULTY_SENSOR")
                    .ok()
                    .and_then(|v| v.parse().ok()),
                dropout_every: parse_env("SIMULATED_DROPOUT_EVERY", defaults.acquisition.dropout_every),
            },
            sensors: SensorConfig {
                num_sensors: parse_env("NUM_SENSORS", defaults.sensors.num_sensors),
                reading_frequency_secs: parse_env(
                    "READING_FREQUENCY_SECS",
                    defaults.sensors.reading_frequency_secs,
                ),
                scale_factor: parse_env("TEMPERATURE_SCALE_FACTOR", defaults.sensors.scale_factor),
            },
            voting: VotingConfig {
                threshold: parse_env("VOTING_THRESHOLD", defaults.voting.threshold),
                history_threshold: parse_env(
                    "VOTING_HISTORY_THRESHOLD",
                    defaults.voting.history_threshold,
                ),
                majority_threshold: parse_env(
                    "MAJORITY_DISTANCE_THRESHOLD",
                    defaults.voting.majority_threshold,
                ),
                max_error_count: parse_env("MAX_ERROR_COUNT", defaults.voting.max_error_count),
                deviation_threshold: parse_env(
                    "DEVIATION_THRESHOLD",
                    defaults.voting.deviation_threshold,
                ),
                strategies,
            },
            monitoring: MonitoringConfig {
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                health_port: parse_env("HEALTH_PORT", defaults.monitoring.health_port),
                smoothing_factor: parse_env("SMOOTHING_FACTOR", defaults.monitoring.smoothing_factor),
                export_path: env::var("EXPORT_PATH").ok(),
                event_capacity: parse_env("EVENT_CAPACITY", defaults.monitoring.event_capacity),
            },
        }
        .clamped())
    }

    /// Layered load: optional settings file, then `VOTER__SECTION__KEY` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layered(path.as_ref(), env_overrides())
    }

    fn load_layered(path: &Path, overrides: config::Environment) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(overrides)
            .build()
            .with_context(|| format!("reading settings from {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .context("deserializing settings")?;

        Ok(config.clamped())
    }

    /// Pulls sensor count, reading period and smoothing back into their bounds.
    pub fn clamped(mut self) -> Self {
        let sensors = self.sensors.num_sensors.clamp(MIN_SENSORS, MAX_SENSORS);
        if sensors != self.sensors.num_sensors {
            tracing::warn!(
                "num_sensors {} out of range, using {}",
                self.sensors.num_sensors,
                sensors
            );
            self.sensors.num_sensors = sensors;
        }

        let frequency = clamp_frequency(self.sensors.reading_frequency_secs);
        if frequency != self.sensors.reading_frequency_secs {
            tracing::warn!(
                "reading period {}s out of range, using {}s",
                self.sensors.reading_frequency_secs,
                frequency
            );
            self.sensors.reading_frequency_secs = frequency;
        }

        let smoothing = if self.monitoring.smoothing_factor.is_nan() {
            MAX_SMOOTHING_FACTOR
        } else {
            self.monitoring
                .smoothing_factor
                .clamp(MIN_SMOOTHING_FACTOR, MAX_SMOOTHING_FACTOR)
        };
        if smoothing != self.monitoring.smoothing_factor {
            tracing::warn!(
                "smoothing factor {} out of range, using {}",
                self.monitoring.smoothing_factor,
                smoothing
            );
            self.monitoring.smoothing_factor = smoothing;
        }

        self
    }
}

pub fn clamp_frequency(secs: f64) -> f64 {
    if secs.is_nan() {
        return MIN_READING_FREQUENCY;
    }
    secs.clamp(MIN_READING_FREQUENCY, MAX_READING_FREQUENCY)
}

pub fn clamp_sensor_count(count: usize) -> usize {
    count.clamp(MIN_SENSORS, MAX_SENSORS)
}

/// `VOTER__VOTING__STRATEGIES=average,median` arrives as a list.
fn env_overrides() -> config::Environment {
    config::Environment::with_prefix("VOTER")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("voting.strategies")
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = Config::default();
        assert_eq!(config.sensors.num_sensors, 6);
        assert_eq!(config.sensors.scale_factor, 10.0);
        assert_eq!(config.acquisition.error_value, -2731);
        assert_eq!(config.voting.threshold, 1.0);
        assert_eq!(config.voting.history_threshold, 0.5);
        assert_eq!(config.voting.max_error_count, 2);
        assert_eq!(config.voting.strategies.len(), 5);
    }

    #[test]
    fn test_clamped_pulls_values_into_bounds() {
        let mut config = Config::default();
        config.sensors.num_sensors = 12;
        config.sensors.reading_frequency_secs = 0.01;
        config.monitoring.smoothing_factor = 0.0;

        let config = config.clamped();
        assert_eq!(config.sensors.num_sensors, MAX_SENSORS);
        assert_eq!(config.sensors.reading_frequency_secs, MIN_READING_FREQUENCY);
        assert_eq!(config.monitoring.smoothing_factor, MIN_SMOOTHING_FACTOR);
    }

    #[test]
    fn test_load_reads_toml_and_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[sensors]
num_sensors = 4

[voting]
deviation_threshold = 0.5
strategies = ["average", "Average Adaptive"]
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sensors.num_sensors, 4);
        assert_eq!(config.sensors.scale_factor, 10.0);
        assert_eq!(config.voting.deviation_threshold, 0.5);
        assert_eq!(config.voting.max_error_count, 2);
        assert_eq!(
            config.voting.strategies,
            vec![StrategyKind::Average, StrategyKind::AverageAdaptive]
        );
    }

    #[test]
    fn test_env_layer_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[voting]\nstrategies = [\"majority\"]").unwrap();

        let mut vars = config::Map::new();
        vars.insert(
            "VOTER__VOTING__STRATEGIES".to_string(),
            "average,Median".to_string(),
        );
        vars.insert("VOTER__SENSORS__NUM_SENSORS".to_string(), "3".to_string());
        vars.insert("VOTER__MONITORING__LOG_LEVEL".to_string(), "debug".to_string());

        let config =
            Config::load_layered(file.path(), env_overrides().source(Some(vars))).unwrap();
        assert_eq!(
            config.voting.strategies,
            vec![StrategyKind::Average, StrategyKind::Median]
        );
        assert_eq!(config.sensors.num_sensors, 3);
        assert_eq!(config.monitoring.log_level, "debug");
    }

    #[test]
    fn test_env_layer_single_strategy_is_a_list() {
        let mut vars = config::Map::new();
        vars.insert(
            "VOTER__VOTING__STRATEGIES".to_string(),
            "average-adaptive".to_string(),
        );

        let config = Config::load_layered(
            Path::new("/nonexistent/voter-settings.toml"),
            env_overrides().source(Some(vars)),
        )
        .unwrap();
        assert_eq!(config.voting.strategies, vec![StrategyKind::AverageAdaptive]);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/voter-settings.toml").unwrap();
        assert_eq!(config.sensors.num_sensors, MAX_SENSORS);
        assert_eq!(config.acquisition.source, SourceKind::Simulated);
    }
}

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use crate::core::config::{AcquisitionConfig, SensorConfig, DEFAULT_ERROR_VALUE};
use crate::core::error::AcquisitionError;

/// A device exposing one holding register per temperature sensor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterSource: Send {
    async fn connect(&mut self) -> Result<(), AcquisitionError>;

    async fn read_registers(
        &mut self,
        start_address: u16,
        count: usize,
    ) -> Result<Vec<i32>, AcquisitionError>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub base_temperature: f64,
    pub noise: f64,
    pub drift_amplitude: f64,
    pub drift_period_ticks: u64,
    pub faulty_sensor: Option<usize>,
    pub fault_offset: f64,
    /// Every n-th tick the last sensor reports the sentinel. 0 disables.
    pub dropout_every: u64,
    pub error_value: i32,
    pub scale_factor: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_temperature: 21.5,
            noise: 0.1,
            drift_amplitude: 0.5,
            drift_period_ticks: 120,
            faulty_sensor: None,
            fault_offset: 8.0,
            dropout_every: 0,
            error_value: DEFAULT_ERROR_VALUE,
            scale_factor: 10.0,
        }
    }
}

impl SimulationConfig {
    pub fn from_settings(acquisition: &AcquisitionConfig, sensors: &SensorConfig) -> Self {
        Self {
            faulty_sensor: acquisition.faulty_sensor,
            dropout_every: acquisition.dropout_every,
            error_value: acquisition.error_value,
            scale_factor: sensors.scale_factor,
            ..Default::default()
        }
    }
}

/// Synthetic sensor bank: a slowly drifting common temperature with per
/// sensor noise, an optional stuck-high sensor and optional dropouts.
pub struct SimulatedSource {
    config: SimulationConfig,
    rng: StdRng,
    tick: u64,
    connected: bool,
}

impl SimulatedSource {
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: SimulationConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulationConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            tick: 0,
            connected: false,
        }
    }

    fn temperature(&mut self, sensor: usize) -> f64 {
        let phase = if self.config.drift_period_ticks == 0 {
            0.0
        } else {
            (self.tick % self.config.drift_period_ticks) as f64
                / self.config.drift_period_ticks as f64
        };
        let drift = self.config.drift_amplitude * (phase * std::f64::consts::TAU).sin();
        let noise = if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..=self.config.noise)
        } else {
            0.0
        };

        let mut value = self.config.base_temperature + drift + noise;
        if self.config.faulty_sensor == Some(sensor) {
            value += self.config.fault_offset;
        }
        value
    }
}

#[async_trait]
impl RegisterSource for SimulatedSource {
    async fn connect(&mut self) -> Result<(), AcquisitionError> {
        self.connected = true;
        Ok(())
    }

    async fn read_registers(
        &mut self,
        start_address: u16,
        count: usize,
    ) -> Result<Vec<i32>, AcquisitionError> {
        if !self.connected {
            return Err(AcquisitionError::NotConnected);
        }

        let dropout = self.config.dropout_every > 0
            && self.tick % self.config.dropout_every == self.config.dropout_every - 1;

        let mut registers = Vec::with_capacity(count);
        for i in 0..count {
            let sensor = start_address as usize + i;
            if dropout && i + 1 == count {
                registers.push(self.config.error_value);
                continue;
            }
            let value = self.temperature(sensor);
            registers.push((value * self.config.scale_factor).round() as i32);
        }

        self.tick += 1;
        Ok(registers)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn describe(&self) -> String {
        "simulated sensor bank".to_string()
    }
}

/// Plays back register rows recorded one tick per line.
///
/// Values may be separated by `;`, `,` or whitespace. Blank lines and lines
/// starting with `#` are skipped.
pub struct ReplaySource {
    path: Option<PathBuf>,
    rows: Vec<Vec<i32>>,
    cursor: usize,
    looping: bool,
    connected: bool,
}

impl ReplaySource {
    pub fn from_file(path: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            path: Some(path.into()),
            rows: Vec::new(),
            cursor: 0,
            looping,
            connected: false,
        }
    }

    pub fn from_rows(rows: Vec<Vec<i32>>, looping: bool) -> Self {
        Self {
            path: None,
            rows,
            cursor: 0,
            looping,
            connected: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.cursor)
    }
}

pub fn parse_replay(text: &str) -> Result<Vec<Vec<i32>>, AcquisitionError> {
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split(|c: char| c == ';' || c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<i32>().map_err(|e| {
                    AcquisitionError::InvalidResponse(format!(
                        "line {}: {:?} is not a register value: {}",
                        line_no + 1,
                        field,
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        rows.push(row);
    }

    Ok(rows)
}

#[async_trait]
impl RegisterSource for ReplaySource {
    async fn connect(&mut self) -> Result<(), AcquisitionError> {
        if let Some(path) = &self.path {
            let text = tokio::fs::read_to_string(path).await?;
            self.rows = parse_replay(&text)?;
            self.cursor = 0;
            tracing::info!("Loaded {} recorded ticks from {}", self.rows.len(), path.display());
        }
        self.connected = true;
        Ok(())
    }

    async fn read_registers(
        &mut self,
        start_address: u16,
        count: usize,
    ) -> Result<Vec<i32>, AcquisitionError> {
        if !self.connected {
            return Err(AcquisitionError::NotConnected);
        }

        if self.cursor >= self.rows.len() {
            if self.looping && !self.rows.is_empty() {
                self.cursor = 0;
            } else {
                return Err(AcquisitionError::Exhausted);
            }
        }

        let row = &self.rows[self.cursor];
        self.cursor += 1;

        let start = start_address as usize;
        row.get(start..start + count)
            .map(<[i32]>::to_vec)
            .ok_or_else(|| {
                AcquisitionError::InvalidResponse(format!(
                    "recorded tick has {} registers, requested {}..{}",
                    row.len(),
                    start,
                    start + count
                ))
            })
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("replay of {}", path.display()),
            None => "in-memory replay".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_simulated_requires_connect() {
        let mut source = SimulatedSource::seeded(SimulationConfig::default(), 7);
        assert!(matches!(
            source.read_registers(0, 3).await,
            Err(AcquisitionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_simulated_values_near_base() {
        let config = SimulationConfig {
            drift_amplitude: 0.0,
            ..Default::default()
        };
        let mut source = SimulatedSource::seeded(config, 7);
        assert_ok!(source.connect().await);

        let registers = source.read_registers(0, 6).await.unwrap();
        assert_eq!(registers.len(), 6);
        assert!(registers.iter().all(|&r| (214..=216).contains(&r)));
    }

    #[tokio::test]
    async fn test_simulated_fault_and_dropout() {
        let config = SimulationConfig {
            noise: 0.0,
            drift_amplitude: 0.0,
            faulty_sensor: Some(1),
            dropout_every: 2,
            ..Default::default()
        };
        let mut source = SimulatedSource::seeded(config, 1);
        source.connect().await.unwrap();

        let first = source.read_registers(0, 3).await.unwrap();
        assert_eq!(first, vec![215, 295, 215]);

        let second = source.read_registers(0, 3).await.unwrap();
        assert_eq!(second, vec![215, 295, DEFAULT_ERROR_VALUE]);
    }

    #[test]
    fn test_parse_replay_mixed_separators() {
        let rows = parse_replay("# header\n215;216;-2731\n\n 200, 201 202\n").unwrap();
        assert_eq!(rows, vec![vec![215, 216, -2731], vec![200, 201, 202]]);
    }

    #[test]
    fn test_parse_replay_rejects_garbage() {
        let err = parse_replay("215;abc").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_replay_exhausts_without_loop() {
        let mut source = ReplaySource::from_rows(vec![vec![1, 2], vec![3, 4]], false);
        source.connect().await.unwrap();

        assert_eq!(source.read_registers(0, 2).await.unwrap(), vec![1, 2]);
        assert_eq!(source.read_registers(1, 1).await.unwrap(), vec![4]);
        assert!(matches!(
            source.read_registers(0, 2).await,
            Err(AcquisitionError::Exhausted)
        ));
    }

    #[tokio::test]
    async fn test_replay_loops() {
        let mut source = ReplaySource::from_rows(vec![vec![1, 2]], true);
        source.connect().await.unwrap();
        source.read_registers(0, 2).await.unwrap();
        assert_eq!(source.read_registers(0, 2).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_replay_short_row_is_invalid() {
        let mut source = ReplaySource::from_rows(vec![vec![1, 2]], false);
        source.connect().await.unwrap();
        assert!(matches!(
            source.read_registers(0, 3).await,
            Err(AcquisitionError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "215;-2731;230").unwrap();

        let mut source = ReplaySource::from_file(file.path(), false);
        source.connect().await.unwrap();
        assert_eq!(source.remaining(), 1);
        assert_eq!(source.read_registers(0, 3).await.unwrap(), vec![215, -2731, 230]);
    }
}

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::acquisition::{exponential_smoothing, fill_missing, Reading};
use crate::core::error::ExportError;
use crate::strategy::{StrategyKind, VoteResults};

/// Time series of everything the pipeline produced, for charting and export.
///
/// All series share the time axis: a sensor gap repeats the previous value
/// (0.0 before the first one) and a strategy that was inactive on a tick
/// records `None` for it.
#[derive(Debug, Clone)]
pub struct TickHistory {
    num_sensors: usize,
    reading_frequency: f64,
    smoothing_factor: f64,
    time: Vec<f64>,
    raw: Vec<Vec<f64>>,
    smoothed: Vec<Vec<f64>>,
    votes: Vec<(StrategyKind, Vec<Option<f64>>)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub x_data: Vec<f64>,
    pub sensor_data: Vec<Vec<f64>>,
    pub smoothed_data: Vec<Vec<f64>>,
    pub voting_data: BTreeMap<String, Vec<Option<f64>>>,
}

impl TickHistory {
    pub fn new(num_sensors: usize, reading_frequency: f64, smoothing_factor: f64) -> Self {
        Self {
            num_sensors,
            reading_frequency,
            smoothing_factor: smoothing_factor.clamp(0.0, 1.0),
            time: Vec::new(),
            raw: vec![Vec::new(); num_sensors],
            smoothed: vec![Vec::new(); num_sensors],
            votes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn num_sensors(&self) -> usize {
        self.num_sensors
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.smoothing_factor
    }

    pub fn set_smoothing_factor(&mut self, factor: f64) {
        self.smoothing_factor = if factor.is_nan() { 1.0 } else { factor.clamp(0.0, 1.0) };
    }

    pub fn reading_frequency(&self) -> f64 {
        self.reading_frequency
    }

    pub fn set_reading_frequency(&mut self, secs: f64) {
        self.reading_frequency = secs;
    }

    /// Changing the sensor count invalidates every series.
    pub fn set_num_sensors(&mut self, num_sensors: usize) {
        self.num_sensors = num_sensors;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.time.clear();
        self.raw = vec![Vec::new(); self.num_sensors];
        self.smoothed = vec![Vec::new(); self.num_sensors];
        self.votes.clear();
    }

    pub fn record(&mut self, readings: &[Reading], results: &VoteResults) {
        let previous: Option<Vec<f64>> = (!self.time.is_empty())
            .then(|| self.raw.iter().map(|s| s.last().copied().unwrap_or(0.0)).collect());
        let filled = fill_missing(readings, previous.as_deref(), 0.0);

        let t = self
            .time
            .last()
            .map_or(0.0, |last| last + self.reading_frequency);
        self.time.push(t);

        for (i, &raw) in filled.iter().take(self.num_sensors).enumerate() {
            self.raw[i].push(raw);

            let previous = self.smoothed[i].last().copied().unwrap_or(raw);
            self.smoothed[i].push(exponential_smoothing(raw, previous, self.smoothing_factor));
        }

        let ticks = self.time.len();
        for (kind, value) in results.iter() {
            match self.votes.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, series)) => series.push(value),
                None => {
                    let mut series = vec![None; ticks - 1];
                    series.push(value);
                    self.votes.push((kind, series));
                }
            }
        }
        for (_, series) in &mut self.votes {
            series.resize(ticks, None);
        }
    }

    pub fn raw_series(&self, sensor: usize) -> Option<&[f64]> {
        self.raw.get(sensor).map(Vec::as_slice)
    }

    pub fn smoothed_series(&self, sensor: usize) -> Option<&[f64]> {
        self.smoothed.get(sensor).map(Vec::as_slice)
    }

    pub fn vote_series(&self, kind: StrategyKind) -> Option<&[Option<f64>]> {
        self.votes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, series)| series.as_slice())
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            x_data: self.time.clone(),
            sensor_data: self.raw.clone(),
            smoothed_data: self.smoothed.clone(),
            voting_data: self
                .votes
                .iter()
                .map(|(kind, series)| (kind.display_name().to_string(), series.clone()))
                .collect(),
        }
    }

    /// Semicolon separated, one decimal, comma as decimal mark.
    pub fn to_csv(&self) -> Result<String, ExportError> {
        if self.time.is_empty() {
            return Err(ExportError::NoData);
        }

        let mut out = String::from("Time [s]");
        for i in 0..self.num_sensors {
            let _ = write!(out, ";Sensor_{} [C]", i + 1);
        }
        out.push('\n');

        for (row, t) in self.time.iter().enumerate() {
            out.push_str(&decimal_comma(*t));
            for series in &self.raw {
                out.push(';');
                if let Some(value) = series.get(row) {
                    out.push_str(&decimal_comma(*value));
                }
            }
            out.push('\n');
        }

        Ok(out)
    }

    pub async fn export_csv(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let csv = self.to_csv()?;
        tokio::fs::write(path.as_ref(), csv).await?;
        tracing::info!("Exported {} ticks to {}", self.len(), path.as_ref().display());
        Ok(())
    }

    pub async fn export_json(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        if self.time.is_empty() {
            return Err(ExportError::NoData);
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        tokio::fs::write(path.as_ref(), json).await?;
        Ok(())
    }
}

fn decimal_comma(value: f64) -> String {
    format!("{:.1}", value).replace('.', ",")
}

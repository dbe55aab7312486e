use serde::Serialize;

use crate::core::config::MAX_SENSORS;

/// Health change of a single sensor observed during one vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorTransition {
    Quarantined(usize),
    Recovered(usize),
}

impl SensorTransition {
    pub fn sensor(&self) -> usize {
        match *self {
            SensorTransition::Quarantined(sensor) | SensorTransition::Recovered(sensor) => sensor,
        }
    }

    /// Same transition with the sensor index passed through `f`.
    pub fn map_sensor(self, f: impl FnOnce(usize) -> usize) -> Self {
        match self {
            SensorTransition::Quarantined(sensor) => SensorTransition::Quarantined(f(sensor)),
            SensorTransition::Recovered(sensor) => SensorTransition::Recovered(f(sensor)),
        }
    }
}

/// Mean over trusted sensors, quarantining sensors that keep deviating and
/// healing them once they agree with the trusted mean again.
///
/// Per-sensor state is indexed by position in the reading vector and lives
/// for the lifetime of the strategy until [`reset`](Self::reset). Storage is
/// allocated up front for `capacity` sensors; `tracked` marks how many slots
/// have been seen so far and never decreases between resets.
#[derive(Debug, Clone)]
pub struct AverageAdaptiveStrategy {
    max_error_count: i32,
    deviation_threshold: f64,
    active: Vec<bool>,
    error_count: Vec<i32>,
    tracked: usize,
    last_transitions: Vec<SensorTransition>,
}

impl Default for AverageAdaptiveStrategy {
    fn default() -> Self {
        Self::new(2, 1.0)
    }
}

impl AverageAdaptiveStrategy {
    pub fn new(max_error_count: i32, deviation_threshold: f64) -> Self {
        Self::with_capacity(max_error_count, deviation_threshold, MAX_SENSORS)
    }

    pub fn with_capacity(max_error_count: i32, deviation_threshold: f64, capacity: usize) -> Self {
        Self {
            max_error_count,
            deviation_threshold,
            active: vec![true; capacity],
            error_count: vec![0; capacity],
            tracked: 0,
            last_transitions: Vec::new(),
        }
    }

    pub fn max_error_count(&self) -> i32 {
        self.max_error_count
    }

    pub fn deviation_threshold(&self) -> f64 {
        self.deviation_threshold
    }

    /// Trust flag per tracked sensor.
    pub fn active_status(&self) -> &[bool] {
        &self.active[..self.tracked]
    }

    pub fn error_count(&self) -> &[i32] {
        &self.error_count[..self.tracked]
    }

    /// Quarantine and recovery events produced by the most recent vote.
    pub fn last_transitions(&self) -> &[SensorTransition] {
        &self.last_transitions
    }

    pub fn reset(&mut self) {
        self.active.fill(true);
        self.error_count.fill(0);
        self.tracked = 0;
        self.last_transitions.clear();
    }

    pub fn vote(&mut self, data: &[f64], historical: Option<f64>) -> Option<f64> {
        self.last_transitions.clear();
        if data.is_empty() {
            return None;
        }

        self.track(data.len());

        let Some(average) = self.active_average(data) else {
            // Nobody is trusted: only try to heal, using the plain mean as reference.
            let reference = data.iter().sum::<f64>() / data.len() as f64;
            for (i, &reading) in data.iter().enumerate() {
                self.try_recover(i, reading, reference);
            }
            return None;
        };

        for (i, &reading) in data.iter().enumerate() {
            if self.active[i] {
                self.update_active(i, reading, average, historical);
            } else {
                self.try_recover(i, reading, average);
            }
        }

        Some(average)
    }

    fn track(&mut self, sensors: usize) {
        if sensors > self.active.len() {
            tracing::warn!(
                "reading vector of {} exceeds adaptive capacity {}, growing",
                sensors,
                self.active.len()
            );
            self.active.resize(sensors, true);
            self.error_count.resize(sensors, 0);
        }
        self.tracked = self.tracked.max(sensors);
    }

    fn active_average(&self, data: &[f64]) -> Option<f64> {
        let (total, count) = data
            .iter()
            .zip(&self.active)
            .filter(|(_, active)| **active)
            .fold((0.0, 0usize), |(total, count), (&reading, _)| {
                (total + reading, count + 1)
            });

        (count > 0).then(|| total / count as f64)
    }

    fn update_active(&mut self, index: usize, reading: f64, average: f64, historical: Option<f64>) {
        let deviates_from_average = (reading - average).abs() > self.deviation_threshold;
        let penalize = match historical {
            Some(h) => deviates_from_average && (reading - h).abs() > self.deviation_threshold,
            None => deviates_from_average,
        };

        if !penalize {
            self.error_count[index] = 0;
            return;
        }

        self.error_count[index] += 1;
        if self.error_count[index] >= self.max_error_count {
            self.active[index] = false;
            self.last_transitions.push(SensorTransition::Quarantined(index));
            tracing::warn!(
                sensor = index,
                reading,
                average,
                "sensor quarantined after {} deviating ticks",
                self.error_count[index]
            );
        }
    }

    fn try_recover(&mut self, index: usize, reading: f64, reference: f64) {
        if (reading - reference).abs() > self.deviation_threshold {
            self.error_count[index] = self.max_error_count;
            return;
        }

        self.error_count[index] -= 1;
        if self.error_count[index] <= 0 && !self.active[index] {
            self.active[index] = true;
            self.last_transitions.push(SensorTransition::Recovered(index));
            tracing::info!(sensor = index, reading, "sensor recovered");
        }
    }
}

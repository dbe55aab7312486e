//! Turns raw fixed-point register values into nullable temperatures.

use super::Reading;

pub const MIN_PLAUSIBLE_READING: f64 = -50.0;
pub const MAX_PLAUSIBLE_READING: f64 = 150.0;

/// Sentinel registers become `None`, everything else `value / scale_factor`.
pub fn parse_registers(raw: &[i32], error_value: i32, scale_factor: f64) -> Vec<Reading> {
    raw.iter()
        .map(|&value| {
            if value == error_value {
                None
            } else {
                Some(f64::from(value) / scale_factor)
            }
        })
        .collect()
}

/// Drops missing readings, keeping order.
pub fn filter_valid(readings: &[Reading]) -> Vec<f64> {
    readings.iter().flatten().copied().collect()
}

/// Substitutes each gap with the previous tick's value at the same index,
/// or `default` when there is none.
pub fn fill_missing(readings: &[Reading], previous: Option<&[f64]>, default: f64) -> Vec<f64> {
    readings
        .iter()
        .enumerate()
        .map(|(i, reading)| {
            reading
                .or_else(|| previous.and_then(|p| p.get(i).copied()))
                .unwrap_or(default)
        })
        .collect()
}

pub fn exponential_smoothing(current: f64, previous: f64, factor: f64) -> f64 {
    factor * current + (1.0 - factor) * previous
}

pub fn in_range(reading: f64, min: f64, max: f64) -> bool {
    (min..=max).contains(&reading)
}

pub fn is_plausible(reading: f64) -> bool {
    in_range(reading, MIN_PLAUSIBLE_READING, MAX_PLAUSIBLE_READING)
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PerformanceMetrics {
    ticks_received: AtomicU64,
    ticks_voted: AtomicU64,
    ticks_rejected: AtomicU64,
    null_readings: AtomicU64,
    implausible_readings: AtomicU64,
    total_vote_latency_us: AtomicU64,
    start_time: Instant,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            ticks_received: AtomicU64::new(0),
            ticks_voted: AtomicU64::new(0),
            ticks_rejected: AtomicU64::new(0),
            null_readings: AtomicU64::new(0),
            implausible_readings: AtomicU64::new(0),
            total_vote_latency_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn increment_ticks_received(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_ticks_rejected(&self) {
        self.ticks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_null_readings(&self, count: usize) {
        self.null_readings.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_implausible_readings(&self, count: usize) {
        self.implausible_readings
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_vote(&self, latency: Duration) {
        self.ticks_voted.fetch_add(1, Ordering::Relaxed);
        self.total_vote_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn get_ticks_received(&self) -> u64 {
        self.ticks_received.load(Ordering::Relaxed)
    }

    pub fn get_ticks_voted(&self) -> u64 {
        self.ticks_voted.load(Ordering::Relaxed)
    }

    pub fn get_ticks_rejected(&self) -> u64 {
        self.ticks_rejected.load(Ordering::Relaxed)
    }

    pub fn get_null_readings(&self) -> u64 {
        self.null_readings.load(Ordering::Relaxed)
    }

    pub fn get_implausible_readings(&self) -> u64 {
        self.implausible_readings.load(Ordering::Relaxed)
    }

    pub fn get_average_vote_latency_us(&self) -> f64 {
        let voted = self.get_ticks_voted();
        if voted == 0 {
            0.0
        } else {
            self.total_vote_latency_us.load(Ordering::Relaxed) as f64 / voted as f64
        }
    }

    pub fn get_uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn get_tick_rate(&self) -> f64 {
        let uptime = self.get_uptime_secs();
        if uptime == 0 {
            0.0
        } else {
            self.get_ticks_received() as f64 / uptime as f64
        }
    }

    pub fn get_rejection_rate(&self) -> f64 {
        let received = self.get_ticks_received();
        if received == 0 {
            0.0
        } else {
            self.get_ticks_rejected() as f64 / received as f64
        }
    }

    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        let mut snapshot = HashMap::new();

        snapshot.insert(
            "ticks_received".to_string(),
            serde_json::json!(self.get_ticks_received()),
        );
        snapshot.insert("ticks_voted".to_string(), serde_json::json!(self.get_ticks_voted()));
        snapshot.insert(
            "ticks_rejected".to_string(),
            serde_json::json!(self.get_ticks_rejected()),
        );
        snapshot.insert(
            "null_readings".to_string(),
            serde_json::json!(self.get_null_readings()),
        );
        snapshot.insert(
            "implausible_readings".to_string(),
            serde_json::json!(self.get_implausible_readings()),
        );
        snapshot.insert(
            "average_vote_latency_us".to_string(),
            serde_json::json!(self.get_average_vote_latency_us()),
        );
        snapshot.insert("uptime_secs".to_string(), serde_json::json!(self.get_uptime_secs()));
        snapshot.insert("tick_rate_per_sec".to_string(), serde_json::json!(self.get_tick_rate()));
        snapshot.insert(
            "rejection_rate".to_string(),
            serde_json::json!(self.get_rejection_rate()),
        );

        snapshot
    }

    pub fn log_report(&self) {
        tracing::info!(
            ticks_received = self.get_ticks_received(),
            ticks_voted = self.get_ticks_voted(),
            ticks_rejected = self.get_ticks_rejected(),
            null_readings = self.get_null_readings(),
            implausible_readings = self.get_implausible_readings(),
            avg_vote_latency_us = %format!("{:.1}", self.get_average_vote_latency_us()),
            rejection_rate = %format!("{:.2}%", self.get_rejection_rate() * 100.0),
            "voting pipeline report"
        );
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = PerformanceMetrics::new();
        assert_eq!(metrics.get_ticks_received(), 0);
        assert_eq!(metrics.get_average_vote_latency_us(), 0.0);
        assert_eq!(metrics.get_rejection_rate(), 0.0);
    }

    #[test]
    fn test_vote_latency_average() {
        let metrics = PerformanceMetrics::new();
        metrics.record_vote(Duration::from_micros(10));
        metrics.record_vote(Duration::from_micros(20));
        assert_eq!(metrics.get_ticks_voted(), 2);
        assert_eq!(metrics.get_average_vote_latency_us(), 15.0);
    }

    #[test]
    fn test_rejection_rate() {
        let metrics = PerformanceMetrics::new();
        for _ in 0..4 {
            metrics.increment_ticks_received();
        }
        metrics.increment_ticks_rejected();
        assert_eq!(metrics.get_rejection_rate(), 0.25);
        assert_eq!(metrics.snapshot()["ticks_rejected"], serde_json::json!(1));
    }
}

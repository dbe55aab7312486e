//! Voting strategies and the orchestrator that runs them once per tick.
//!
//! The strategy set is closed: [`VotingStrategy`] is an enum over the five
//! implementations and [`StrategyKind`] is the stable identifier used for
//! historical results and result lookups. Display names only appear at the
//! presentation boundary.

pub mod adaptive;
pub mod average;
pub mod m_out_of_n;
pub mod majority;
pub mod median;
pub mod voter;

pub use adaptive::{AverageAdaptiveStrategy, SensorTransition};
pub use average::AverageStrategy;
pub use m_out_of_n::MOutOfNStrategy;
pub use majority::MajorityStrategy;
pub use median::MedianStrategy;
pub use voter::{VoteResults, Voter};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::config::VotingConfig;
use crate::core::error::ParseStrategyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[serde(alias = "Average")]
    Average,
    #[serde(alias = "Median")]
    Median,
    #[serde(alias = "Advanced m out of n")]
    MOutOfN,
    #[serde(alias = "Majority")]
    Majority,
    #[serde(alias = "Average Adaptive")]
    AverageAdaptive,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Average,
        StrategyKind::Median,
        StrategyKind::MOutOfN,
        StrategyKind::Majority,
        StrategyKind::AverageAdaptive,
    ];

    /// Literal name consumers key results by. Must not change.
    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Average => "Average",
            StrategyKind::Median => "Median",
            StrategyKind::MOutOfN => "Advanced m out of n",
            StrategyKind::Majority => "Majority",
            StrategyKind::AverageAdaptive => "Average Adaptive",
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Average => "average",
            StrategyKind::Median => "median",
            StrategyKind::MOutOfN => "m-out-of-n",
            StrategyKind::Majority => "majority",
            StrategyKind::AverageAdaptive => "average-adaptive",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for StrategyKind {
    type Err = ParseStrategyError;

    /// Accepts either the display name or the kebab-case id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        StrategyKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.display_name() == trimmed || kind.id().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseStrategyError(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum VotingStrategy {
    Average(AverageStrategy),
    Median(MedianStrategy),
    MOutOfN(MOutOfNStrategy),
    Majority(MajorityStrategy),
    AverageAdaptive(AverageAdaptiveStrategy),
}

impl VotingStrategy {
    /// Builds the strategy for `kind` with thresholds from `config`.
    pub fn from_config(kind: StrategyKind, config: &VotingConfig, sensor_capacity: usize) -> Self {
        match kind {
            StrategyKind::Average => VotingStrategy::Average(AverageStrategy),
            StrategyKind::Median => VotingStrategy::Median(MedianStrategy),
            StrategyKind::MOutOfN => VotingStrategy::MOutOfN(MOutOfNStrategy::new(
                config.threshold,
                config.history_threshold,
            )),
            StrategyKind::Majority => {
                VotingStrategy::Majority(MajorityStrategy::new(config.majority_threshold))
            }
            StrategyKind::AverageAdaptive => {
                VotingStrategy::AverageAdaptive(AverageAdaptiveStrategy::with_capacity(
                    config.max_error_count,
                    config.deviation_threshold,
                    sensor_capacity,
                ))
            }
        }
    }

    /// Same as [`from_config`](Self::from_config) for every enabled kind, in order.
    pub fn all_from_config(config: &VotingConfig, sensor_capacity: usize) -> Vec<Self> {
        config
            .strategies
            .iter()
            .map(|kind| Self::from_config(*kind, config, sensor_capacity))
            .collect()
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            VotingStrategy::Average(_) => StrategyKind::Average,
            VotingStrategy::Median(_) => StrategyKind::Median,
            VotingStrategy::MOutOfN(_) => StrategyKind::MOutOfN,
            VotingStrategy::Majority(_) => StrategyKind::Majority,
            VotingStrategy::AverageAdaptive(_) => StrategyKind::AverageAdaptive,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    pub fn vote(&mut self, data: &[f64], historical: Option<f64>) -> Option<f64> {
        match self {
            VotingStrategy::Average(s) => s.vote(data),
            VotingStrategy::Median(s) => s.vote(data),
            VotingStrategy::MOutOfN(s) => s.vote(data, historical),
            VotingStrategy::Majority(s) => s.vote(data),
            VotingStrategy::AverageAdaptive(s) => s.vote(data, historical),
        }
    }

    /// No-op for everything but the adaptive strategy.
    pub fn reset(&mut self) {
        if let VotingStrategy::AverageAdaptive(s) = self {
            s.reset();
        }
    }

    pub fn as_adaptive(&self) -> Option<&AverageAdaptiveStrategy> {
        match self {
            VotingStrategy::AverageAdaptive(s) => Some(s),
            _ => None,
        }
    }
}

impl From<AverageStrategy> for VotingStrategy {
    fn from(s: AverageStrategy) -> Self {
        VotingStrategy::Average(s)
    }
}

impl From<MedianStrategy> for VotingStrategy {
    fn from(s: MedianStrategy) -> Self {
        VotingStrategy::Median(s)
    }
}

impl From<MOutOfNStrategy> for VotingStrategy {
    fn from(s: MOutOfNStrategy) -> Self {
        VotingStrategy::MOutOfN(s)
    }
}

impl From<MajorityStrategy> for VotingStrategy {
    fn from(s: MajorityStrategy) -> Self {
        VotingStrategy::Majority(s)
    }
}

impl From<AverageAdaptiveStrategy> for VotingStrategy {
    fn from(s: AverageAdaptiveStrategy) -> Self {
        VotingStrategy::AverageAdaptive(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_are_literal() {
        let names: Vec<_> = StrategyKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "Average",
                "Median",
                "Advanced m out of n",
                "Majority",
                "Average Adaptive"
            ]
        );
    }

    #[test]
    fn test_parse_accepts_names_and_ids() {
        assert_eq!("Advanced m out of n".parse::<StrategyKind>(), Ok(StrategyKind::MOutOfN));
        assert_eq!("M-OUT-OF-N".parse::<StrategyKind>(), Ok(StrategyKind::MOutOfN));
        assert_eq!(" majority ".parse::<StrategyKind>(), Ok(StrategyKind::Majority));
        assert!("kalman".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_every_strategy_abstains_on_empty_input() {
        let config = VotingConfig::default();
        for mut strategy in VotingStrategy::all_from_config(&config, 6) {
            assert_eq!(strategy.vote(&[], Some(21.0)), None, "{}", strategy.name());
        }
    }

    #[test]
    fn test_from_config_keeps_kind() {
        let config = VotingConfig::default();
        for kind in StrategyKind::ALL {
            assert_eq!(VotingStrategy::from_config(kind, &config, 6).kind(), kind);
        }
    }
}

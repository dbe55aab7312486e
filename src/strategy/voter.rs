use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;

use super::{AverageAdaptiveStrategy, StrategyKind, VotingStrategy};

/// One tick's outcome: an entry per active strategy, in voting order.
///
/// `None` means the strategy had no trustworthy estimate this tick; a
/// strategy that is not active has no entry at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteResults {
    entries: Vec<(StrategyKind, Option<f64>)>,
}

impl VoteResults {
    pub fn get(&self, kind: StrategyKind) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, value)| *value)
    }

    /// Lookup by display name, as presentation code does.
    pub fn get_by_name(&self, name: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(k, _)| k.display_name() == name)
            .map(|(_, value)| *value)
    }

    pub fn contains(&self, kind: StrategyKind) -> bool {
        self.entries.iter().any(|(k, _)| *k == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StrategyKind, Option<f64>)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for VoteResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (kind, value) in &self.entries {
            map.serialize_entry(kind.display_name(), value)?;
        }
        map.end()
    }
}

/// Runs every active strategy on each tick and remembers each one's last
/// good result to hand back to it on the next tick.
///
/// Not synchronized: strategy changes and votes must happen on the same task.
#[derive(Debug, Default)]
pub struct Voter {
    strategies: Vec<VotingStrategy>,
    historical: HashMap<StrategyKind, f64>,
}

impl Voter {
    pub fn new(strategies: Vec<VotingStrategy>) -> Self {
        let mut voter = Self::default();
        voter.set_strategies(strategies);
        voter
    }

    pub fn strategies(&self) -> &[VotingStrategy] {
        &self.strategies
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(VotingStrategy::kind).collect()
    }

    pub fn contains(&self, kind: StrategyKind) -> bool {
        self.strategies.iter().any(|s| s.kind() == kind)
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&VotingStrategy> {
        self.strategies.iter().find(|s| s.kind() == kind)
    }

    pub fn adaptive(&self) -> Option<&AverageAdaptiveStrategy> {
        self.strategies.iter().find_map(VotingStrategy::as_adaptive)
    }

    /// Replaces the active set. Later duplicates of a kind are dropped, and
    /// historical results of kinds no longer active are forgotten.
    pub fn set_strategies(&mut self, strategies: Vec<VotingStrategy>) {
        self.strategies.clear();
        for strategy in strategies {
            if !self.contains(strategy.kind()) {
                self.strategies.push(strategy);
            }
        }
        let strategies = &self.strategies;
        self.historical
            .retain(|kind, _| strategies.iter().any(|s| s.kind() == *kind));
    }

    /// Appends `strategy` unless one of the same kind is already active.
    pub fn add_strategy(&mut self, strategy: VotingStrategy) -> bool {
        if self.contains(strategy.kind()) {
            return false;
        }
        tracing::debug!("strategy enabled: {}", strategy.name());
        self.strategies.push(strategy);
        true
    }

    /// Takes the strategy out of the active set, handing back its state.
    pub fn remove_strategy(&mut self, kind: StrategyKind) -> Option<VotingStrategy> {
        let index = self.strategies.iter().position(|s| s.kind() == kind)?;
        self.historical.remove(&kind);
        tracing::debug!("strategy disabled: {}", kind);
        Some(self.strategies.remove(index))
    }

    pub fn clear_strategies(&mut self) {
        self.strategies.clear();
        self.historical.clear();
    }

    pub fn vote(&mut self, data: &[f64]) -> VoteResults {
        let mut entries = Vec::with_capacity(self.strategies.len());

        for strategy in &mut self.strategies {
            let kind = strategy.kind();
            let result = strategy.vote(data, self.historical.get(&kind).copied());

            // A miss keeps the previous good value.
            if let Some(value) = result {
                self.historical.insert(kind, value);
            }
            entries.push((kind, result));
        }

        VoteResults { entries }
    }

    pub fn reset(&mut self) {
        self.historical.clear();
        for strategy in &mut self.strategies {
            strategy.reset();
        }
    }

    pub fn get_historical_result(&self, kind: StrategyKind) -> Option<f64> {
        self.historical.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::VotingConfig;
    use crate::strategy::{AverageStrategy, MOutOfNStrategy, MedianStrategy};

    fn full_voter() -> Voter {
        Voter::new(VotingStrategy::all_from_config(&VotingConfig::default(), 6))
    }

    #[test]
    fn test_vote_reports_every_active_strategy_in_order() {
        let mut voter = full_voter();
        let results = voter.vote(&[20.0, 20.1, 20.2, 35.0, 20.0]);

        let kinds: Vec<_> = results.iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
        assert!((results.get(StrategyKind::Average).unwrap().unwrap() - 23.06).abs() < 1e-9);
        assert_eq!(results.get_by_name("Median"), Some(Some(20.1)));
        assert_eq!(results.get_by_name("Advanced m out of n"), Some(Some(20.0)));
    }

    #[test]
    fn test_empty_tick_yields_none_for_every_strategy() {
        let mut voter = full_voter();
        let results = voter.vote(&[]);
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn test_historical_result_survives_a_null_tick() {
        let mut voter = Voter::new(vec![
            MOutOfNStrategy::default().into(),
            AverageStrategy.into(),
        ]);

        voter.vote(&[25.0, 25.0, 25.0]);
        assert_eq!(voter.get_historical_result(StrategyKind::MOutOfN), Some(25.0));

        let results = voter.vote(&[10.0, 20.0, 30.0]);
        assert_eq!(results.get(StrategyKind::MOutOfN), Some(None));
        assert_eq!(voter.get_historical_result(StrategyKind::MOutOfN), Some(25.0));
        assert_eq!(voter.get_historical_result(StrategyKind::Average), Some(20.0));

        // Only 25.0 (not the average's 20.0) lets 24.8 through the fallback.
        let results = voter.vote(&[24.8, 40.0, 60.0]);
        assert_eq!(results.get(StrategyKind::MOutOfN), Some(Some(24.8)));
    }

    #[test]
    fn test_add_duplicate_is_noop() {
        let mut voter = Voter::default();
        assert!(voter.add_strategy(MedianStrategy.into()));
        assert!(!voter.add_strategy(MedianStrategy.into()));
        assert_eq!(voter.strategies().len(), 1);
    }

    #[test]
    fn test_set_strategies_drops_duplicates() {
        let mut voter = Voter::default();
        voter.set_strategies(vec![
            AverageStrategy.into(),
            MedianStrategy.into(),
            AverageStrategy.into(),
        ]);
        assert_eq!(voter.kinds(), vec![StrategyKind::Average, StrategyKind::Median]);
    }

    #[test]
    fn test_remove_strategy_forgets_history_and_returns_state() {
        let mut voter = full_voter();
        voter.vote(&[20.0, 20.0, 20.0]);
        assert!(voter.get_historical_result(StrategyKind::AverageAdaptive).is_some());

        let removed = voter.remove_strategy(StrategyKind::AverageAdaptive).unwrap();
        assert_eq!(removed.as_adaptive().unwrap().active_status().len(), 3);
        assert_eq!(voter.get_historical_result(StrategyKind::AverageAdaptive), None);
        assert!(!voter.vote(&[20.0]).contains(StrategyKind::AverageAdaptive));
        assert!(voter.remove_strategy(StrategyKind::AverageAdaptive).is_none());
    }

    #[test]
    fn test_set_strategies_prunes_inactive_history() {
        let mut voter = full_voter();
        voter.vote(&[21.0, 21.0]);
        voter.set_strategies(vec![MedianStrategy.into()]);

        assert_eq!(voter.get_historical_result(StrategyKind::Average), None);
        assert_eq!(voter.get_historical_result(StrategyKind::Median), Some(21.0));
    }

    #[test]
    fn test_reset_clears_history_and_adaptive_state() {
        let mut voter = full_voter();
        voter.vote(&[20.0, 20.0, 20.0, 20.0, 23.0]);
        voter.reset();

        for kind in StrategyKind::ALL {
            assert_eq!(voter.get_historical_result(kind), None);
        }
        assert!(voter.adaptive().unwrap().active_status().is_empty());
    }

    #[test]
    fn test_reset_without_strategies_is_noop() {
        let mut voter = Voter::default();
        voter.reset();
        voter.reset();
        assert!(voter.strategies().is_empty());
        assert!(voter.vote(&[20.0]).is_empty());
    }

    #[test]
    fn test_results_serialize_by_display_name() {
        let mut voter = Voter::new(vec![AverageStrategy.into(), MOutOfNStrategy::default().into()]);
        let results = voter.vote(&[10.0, 30.0]);
        let json = serde_json::to_value(&results).unwrap();

        assert_eq!(json["Average"], serde_json::json!(20.0));
        assert_eq!(json["Advanced m out of n"], serde_json::Value::Null);
    }
}

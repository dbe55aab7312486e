/// "Advanced m out of n": clusters readings by mutual tolerance and accepts
/// the first cluster that gathers a strict majority of sensors.
///
/// Readings are grouped in a single pass over a fixed set of `n` slots, each
/// slot holding a representative value and a tally. A second pass recounts
/// the support of every representative from scratch and returns the first one
/// to reach `m = n/2 + 1`. When nothing reaches majority the strategy falls
/// back to the reading closest to the previous accepted result, provided it
/// lies within `history_threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct MOutOfNStrategy {
    threshold: f64,
    history_threshold: f64,
}

/// Every sensor votes with the same weight.
const SENSOR_WEIGHT: u32 = 1;

impl Default for MOutOfNStrategy {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl MOutOfNStrategy {
    pub fn new(threshold: f64, history_threshold: f64) -> Self {
        Self {
            threshold,
            history_threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn history_threshold(&self) -> f64 {
        self.history_threshold
    }

    pub fn vote(&self, data: &[f64], historical: Option<f64>) -> Option<f64> {
        if data.is_empty() {
            return None;
        }

        let n = data.len();
        let m = n / 2 + 1;

        let mut slots = Slots::new(n);
        slots.seed(data[0], SENSOR_WEIGHT);
        for &x in &data[1..] {
            match slots.find_match(x, self.threshold) {
                Some(j) => slots.tallies[j] += SENSOR_WEIGHT,
                None => slots.add_or_replace(x, SENSOR_WEIGHT),
            }
        }

        // Support recount: tallies from the clustering pass are only provisional.
        let mut support = vec![0u32; n];
        for &x in data {
            for (j, representative) in slots.representatives.iter().enumerate() {
                let Some(rep) = representative else {
                    continue;
                };
                if (x - rep).abs() <= self.threshold {
                    support[j] += SENSOR_WEIGHT;
                    if support[j] as usize >= m {
                        return Some(*rep);
                    }
                }
            }
        }

        self.fallback_to_history(data, historical)
    }

    fn fallback_to_history(&self, data: &[f64], historical: Option<f64>) -> Option<f64> {
        let historical = historical?;

        let (nearest, distance) = data
            .iter()
            .map(|&reading| (reading, (historical - reading).abs()))
            .fold(None::<(f64, f64)>, |best, candidate| match best {
                Some(b) if b.1 <= candidate.1 => Some(b),
                _ => Some(candidate),
            })?;

        (distance <= self.history_threshold).then_some(nearest)
    }
}

struct Slots {
    representatives: Vec<Option<f64>>,
    tallies: Vec<u32>,
}

impl Slots {
    fn new(n: usize) -> Self {
        Self {
            representatives: vec![None; n],
            tallies: vec![0; n],
        }
    }

    fn seed(&mut self, value: f64, weight: u32) {
        self.representatives[0] = Some(value);
        self.tallies[0] = weight;
    }

    /// First occupied slot within tolerance. No search for a closer one.
    fn find_match(&self, value: f64, threshold: f64) -> Option<usize> {
        self.representatives
            .iter()
            .zip(&self.tallies)
            .position(|(rep, &tally)| {
                tally != 0 && rep.map_or(false, |r| (value - r).abs() <= threshold)
            })
    }

    fn add_or_replace(&mut self, value: f64, weight: u32) {
        if let Some(free) = self.tallies.iter().position(|&t| t == 0) {
            self.representatives[free] = Some(value);
            self.tallies[free] = weight;
            return;
        }

        let (min_index, min_tally) = self
            .tallies
            .iter()
            .copied()
            .enumerate()
            .fold((0, u32::MAX), |best, (i, t)| if t < best.1 { (i, t) } else { best });

        if weight <= min_tally {
            self.decay(weight);
        } else {
            self.representatives[min_index] = Some(value);
            self.tallies[min_index] = weight;
            self.decay(min_tally);
        }
    }

    fn decay(&mut self, amount: u32) {
        for tally in &mut self.tallies {
            *tally = tally.saturating_sub(amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_cluster_wins() {
        let strategy = MOutOfNStrategy::default();
        let result = strategy.vote(&[20.0, 20.1, 20.2, 35.0, 20.0], None).unwrap();
        assert!((result - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_representative_is_returned_not_mean() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[20.5, 20.0, 21.2], None), Some(20.5));
    }

    #[test]
    fn test_fallback_picks_reading_near_history() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[10.0, 20.3, 30.0], Some(20.0)), Some(20.3));
    }

    #[test]
    fn test_fallback_rejects_distant_history() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[10.0, 21.0, 30.0], Some(20.0)), None);
    }

    #[test]
    fn test_no_majority_without_history_is_none() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[10.0, 20.0, 30.0], None), None);
    }

    #[test]
    fn test_single_reading_is_its_own_majority() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[22.4], None), Some(22.4));
    }

    #[test]
    fn test_even_split_has_no_majority() {
        let strategy = MOutOfNStrategy::default();
        assert_eq!(strategy.vote(&[20.0, 20.1, 30.0, 30.1], None), None);
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let strategy = MOutOfNStrategy::new(0.5, 0.5);
        assert_eq!(strategy.vote(&[20.0, 20.5, 40.0], None), Some(20.0));
    }

    #[test]
    fn test_empty_is_none_even_with_history() {
        assert_eq!(MOutOfNStrategy::default().vote(&[], Some(20.0)), None);
    }

    #[test]
    fn test_slots_decay_when_incoming_weight_is_not_heavier() {
        let mut slots = Slots::new(2);
        slots.seed(10.0, 2);
        slots.add_or_replace(20.0, 1);
        slots.add_or_replace(30.0, 1);

        assert_eq!(slots.representatives, vec![Some(10.0), Some(20.0)]);
        assert_eq!(slots.tallies, vec![1, 0]);
    }

    #[test]
    fn test_slots_evict_lightest_when_incoming_is_heavier() {
        let mut slots = Slots::new(2);
        slots.seed(10.0, 3);
        slots.add_or_replace(20.0, 1);
        slots.add_or_replace(30.0, 2);

        assert_eq!(slots.representatives, vec![Some(10.0), Some(30.0)]);
        assert_eq!(slots.tallies, vec![2, 1]);
    }
}

use super::average::mean;

/// Groups sorted readings into chains anchored at each reading and returns
/// the mean of the first chain holding a majority.
#[derive(Debug, Clone, PartialEq)]
pub struct MajorityStrategy {
    threshold: f64,
}

impl Default for MajorityStrategy {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MajorityStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn vote(&self, data: &[f64]) -> Option<f64> {
        if data.is_empty() {
            return None;
        }

        let n = data.len();
        // ceil((n + 1) / 2)
        let majority = (n + 2) / 2;

        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        (0..n).find_map(|i| {
            // Distance is measured from the anchor, not from the previous link.
            let anchor = sorted[i];
            let len = 1 + sorted[i + 1..]
                .iter()
                .take_while(|&&x| (x - anchor).abs() <= self.threshold)
                .count();

            if len >= majority {
                mean(&sorted[i..i + len])
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_chain_mean() {
        let strategy = MajorityStrategy::default();
        assert_eq!(strategy.vote(&[1.0, 1.0, 1.0, 10.0]), Some(1.0));
    }

    #[test]
    fn test_majority_requires_more_than_half() {
        let strategy = MajorityStrategy::default();
        // n = 4 needs a chain of 3.
        assert_eq!(strategy.vote(&[20.0, 20.5, 30.0, 30.5]), None);
    }

    #[test]
    fn test_chain_is_anchored_not_transitive() {
        let strategy = MajorityStrategy::default();
        // 20.0 -> 20.8 -> 21.6 would chain transitively, but 21.6 is 1.6 from the anchor.
        let result = strategy.vote(&[21.6, 20.0, 20.8]).unwrap();
        assert!((result - 20.4).abs() < 1e-9);
    }

    #[test]
    fn test_later_anchor_can_win() {
        let strategy = MajorityStrategy::default();
        let result = strategy.vote(&[5.0, 20.0, 20.4, 20.8]).unwrap();
        assert!((result - 20.4).abs() < 1e-9);
    }

    #[test]
    fn test_single_reading() {
        assert_eq!(MajorityStrategy::default().vote(&[18.2]), Some(18.2));
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(MajorityStrategy::default().vote(&[]), None);
    }
}

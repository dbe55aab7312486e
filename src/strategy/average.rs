/// Arithmetic mean of every reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AverageStrategy;

impl AverageStrategy {
    pub fn vote(&self, data: &[f64]) -> Option<f64> {
        mean(data)
    }
}

pub(crate) fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_average_of_readings() {
        assert_eq!(AverageStrategy.vote(&[20.0, 21.0, 22.0, 25.0]), Some(22.0));
    }

    #[test]
    fn test_average_empty_is_none() {
        assert_eq!(AverageStrategy.vote(&[]), None);
    }

    proptest! {
        #[test]
        fn prop_average_lies_between_extremes(data in prop::collection::vec(-50.0f64..150.0, 1..8)) {
            let avg = AverageStrategy.vote(&data).unwrap();
            let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(avg >= min - 1e-9 && avg <= max + 1e-9);
        }

        #[test]
        fn prop_average_times_len_is_sum(data in prop::collection::vec(-50.0f64..150.0, 1..8)) {
            let avg = AverageStrategy.vote(&data).unwrap();
            let sum: f64 = data.iter().sum();
            prop_assert!((avg * data.len() as f64 - sum).abs() < 1e-9);
        }
    }
}

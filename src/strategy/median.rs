/// Statistical median; even-length input averages the two middle values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MedianStrategy;

impl MedianStrategy {
    pub fn vote(&self, data: &[f64]) -> Option<f64> {
        if data.is_empty() {
            return None;
        }

        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

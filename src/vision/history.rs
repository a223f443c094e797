use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::inference::Prediction;

pub const HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DetectionRecord {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub timestamp: DateTime<Utc>,
}

/// Rolling list of past detections, newest batch first.
#[derive(Debug, Clone, Default)]
pub struct DetectionHistory {
    items: VecDeque<DetectionRecord>,
}

impl DetectionHistory {
    /// Prepends one analysis worth of predictions, keeping their order, and
    /// drops the oldest entries beyond [`HISTORY_CAP`].
    pub fn record(&mut self, predictions: &[Prediction], at: DateTime<Utc>) {
        for p in predictions.iter().rev() {
            self.items.push_front(DetectionRecord { prediction: p.clone(), timestamp: at });
        }
        self.items.truncate(HISTORY_CAP);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_vec(&self) -> Vec<DetectionRecord> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn p(class: &str) -> Prediction {
        Prediction { class: class.to_owned(), confidence: 0.5, x: 0.0, y: 0.0, width: 0.0, height: 0.0 }
    }

    #[test]
    fn newest_batch_comes_first_in_order() {
        let t0 = Utc::now();
        let mut h = DetectionHistory::default();
        h.record(&[p("a"), p("b")], t0);
        h.record(&[p("c"), p("d")], t0 + Duration::seconds(1));

        let classes: Vec<_> = h.to_vec().into_iter().map(|r| r.prediction.class).collect();
        assert_eq!(classes, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn capped_at_fifty() {
        let mut h = DetectionHistory::default();
        for i in 0..30 {
            h.record(&[p(&format!("x{i}")), p(&format!("y{i}"))], Utc::now());
        }
        assert_eq!(h.len(), HISTORY_CAP);
        assert_eq!(h.to_vec()[0].prediction.class, "x29");
    }

    #[test]
    fn record_serializes_flat() {
        let mut h = DetectionHistory::default();
        h.record(&[p("ripe")], Utc::now());
        let json = serde_json::to_value(&h.to_vec()[0]).unwrap();
        assert_eq!(json["class"], "ripe");
        assert!(json.get("timestamp").is_some());
    }
}

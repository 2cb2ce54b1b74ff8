use crate::models::classify_types::{Detection, LabelStats};
use std::collections::BTreeMap;

/// Per-label statistics for one image, keyed by lower-cased label.
pub type LabelStatsMap = BTreeMap<String, LabelStats>;

pub fn aggregate(detections: &[Detection]) -> LabelStatsMap {
    let mut stats = LabelStatsMap::new();
    for detection in detections {
        let entry = stats.entry(detection.label.to_lowercase()).or_default();
        entry.count += 1;
        entry.total_confidence += detection.confidence;
    }
    stats
}

pub fn total_count(stats: &LabelStatsMap) -> u32 {
    stats.values().map(|s| s.count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_empty_map() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn groups_case_insensitively() {
        let detections = vec![
            Detection::new("Dog", 0.6),
            Detection::new("dog", 0.8),
            Detection::new("cat", 0.5),
        ];
        let stats = aggregate(&detections);

        assert_eq!(stats.len(), 2);
        let dog = stats["dog"];
        assert_eq!(dog.count, 2);
        assert!((dog.total_confidence - 1.4).abs() < 1e-6);
        assert!((dog.mean_confidence() - 0.7).abs() < 1e-6);
        assert_eq!(stats["cat"].count, 1);
        assert_eq!(total_count(&stats), 3);
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_label() {
        let stats = aggregate(&[Detection::new(" dog", 0.6), Detection::new("dog", 0.8)]);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["dog"].count, 1);
        assert_eq!(stats[" dog"].count, 1);
    }
}

//! Category scoring and the two correction rules applied on top of it.
//!
//! The constants are heuristics carried over as-is; they are not calibrated
//! probabilities.

use crate::models::classify_types::{Category, CategoryScores, LabelStats};
use crate::services::classifier::aggregate::{total_count, LabelStatsMap};
use crate::services::classifier::taxonomy::{self, PERSON_LABEL};

/// Bonus per additional instance of the same label.
pub const MULTIPLICITY_WEIGHT: f32 = 0.3;
/// People must be at least this share of all detections to keep their score.
pub const PERSON_MIN_SHARE: f64 = 0.4;
pub const PERSON_PENALTY: f32 = 0.3;
pub const FOOD_BOOST: f32 = 2.5;
pub const FOOD_FLOOR: f32 = 0.8;

pub fn label_contribution(stats: &LabelStats) -> f32 {
    stats.mean_confidence() * (1.0 + (stats.count.saturating_sub(1)) as f32 * MULTIPLICITY_WEIGHT)
}

/// Raw score per category. Labels without a taxonomy entry are ignored.
pub fn raw_scores(stats: &LabelStatsMap) -> CategoryScores {
    let mut scores = CategoryScores::default();
    for (label, label_stats) in stats {
        if let Some(category) = taxonomy::category_of(label) {
            scores.add(category, label_contribution(label_stats));
        }
    }
    scores
}

/// Damps the People score when people are a minority of what was detected.
pub fn apply_person_penalty(scores: &mut CategoryScores, stats: &LabelStatsMap) {
    let person_count = stats.get(PERSON_LABEL).map(|s| s.count).unwrap_or(0);
    if person_count == 0 {
        return;
    }
    let total = total_count(stats);
    if (person_count as f64) < PERSON_MIN_SHARE * total as f64 {
        let people = scores.get(Category::People);
        scores.set(Category::People, people * PERSON_PENALTY);
    }
}

/// Any food indicator pushes Food up, with a floor so a zero score still moves.
pub fn apply_food_boost(scores: &mut CategoryScores, stats: &LabelStatsMap) {
    let has_food = stats
        .iter()
        .any(|(label, s)| s.count > 0 && taxonomy::is_food_indicator(label));
    if has_food {
        let food = scores.get(Category::Food);
        scores.set(Category::Food, (food * FOOD_BOOST).max(FOOD_FLOOR));
    }
}

pub fn corrected_scores(stats: &LabelStatsMap) -> CategoryScores {
    let mut scores = raw_scores(stats);
    apply_person_penalty(&mut scores, stats);
    apply_food_boost(&mut scores, stats);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classify_types::Detection;
    use crate::services::classifier::aggregate::aggregate;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn unmapped_labels_score_nothing() {
        let stats = aggregate(&[Detection::new("unicorn", 0.9), Detection::new("dragon", 0.4)]);
        let scores = corrected_scores(&stats);
        assert!(scores.iter().all(|(_, s)| s == 0.0));
    }

    #[test]
    fn multiplicity_bonus() {
        let stats = aggregate(&[
            Detection::new("car", 0.5),
            Detection::new("car", 0.5),
            Detection::new("car", 0.5),
        ]);
        // 0.5 * (1 + 2 * 0.3)
        assert!(close(raw_scores(&stats).get(Category::Vehicles), 0.8));
    }

    #[test]
    fn contribution_grows_with_count() {
        let mut previous = 0.0;
        for count in 1..10 {
            let stats = LabelStats {
                count,
                total_confidence: 0.4 * count as f32,
            };
            let contribution = label_contribution(&stats);
            assert!(contribution > previous);
            previous = contribution;
        }
    }

    #[test]
    fn scores_are_deterministic() {
        let detections = vec![
            Detection::new("person", 0.9),
            Detection::new("cup", 0.3),
            Detection::new("laptop", 0.7),
            Detection::new("laptop", 0.6),
        ];
        let first = corrected_scores(&aggregate(&detections));
        for _ in 0..5 {
            assert_eq!(corrected_scores(&aggregate(&detections)), first);
        }
    }

    #[test]
    fn minority_person_is_penalized() {
        let stats = aggregate(&[
            Detection::new("person", 0.9),
            Detection::new("unicorn", 0.5),
            Detection::new("dragon", 0.5),
            Detection::new("griffin", 0.5),
            Detection::new("phoenix", 0.5),
        ]);
        let scores = corrected_scores(&stats);
        assert!(close(scores.get(Category::People), 0.27));
    }

    #[test]
    fn majority_person_is_kept() {
        let stats = aggregate(&[
            Detection::new("person", 0.9),
            Detection::new("person", 0.7),
            Detection::new("car", 0.5),
        ]);
        let scores = corrected_scores(&stats);
        // 0.8 * 1.3
        assert!(close(scores.get(Category::People), 1.04));
    }

    #[test]
    fn person_share_at_threshold_is_kept() {
        // 2 of 5 is exactly the minimum share.
        let stats = aggregate(&[
            Detection::new("person", 0.6),
            Detection::new("person", 0.6),
            Detection::new("car", 0.5),
            Detection::new("bus", 0.5),
            Detection::new("truck", 0.5),
        ]);
        let scores = corrected_scores(&stats);
        // 0.6 * 1.3
        assert!(close(scores.get(Category::People), 0.78));
    }

    #[test]
    fn single_person_with_one_other_is_kept() {
        let stats = aggregate(&[Detection::new("person", 0.5), Detection::new("car", 0.9)]);
        let scores = corrected_scores(&stats);
        assert!(close(scores.get(Category::People), 0.5));
    }

    #[test]
    fn single_person_among_three_others_is_penalized() {
        let stats = aggregate(&[
            Detection::new("person", 0.5),
            Detection::new("car", 0.9),
            Detection::new("bus", 0.9),
            Detection::new("truck", 0.9),
        ]);
        assert!(close(corrected_scores(&stats).get(Category::People), 0.15));
    }

    #[test]
    fn food_boost_has_floor() {
        let stats = aggregate(&[Detection::new("apple", 0.01)]);
        let scores = corrected_scores(&stats);
        assert!(scores.get(Category::Food) >= FOOD_FLOOR);
    }

    #[test]
    fn food_boost_multiplies_strong_scores() {
        let stats = aggregate(&[Detection::new("pizza", 0.9), Detection::new("pizza", 0.9)]);
        let scores = corrected_scores(&stats);
        // 0.9 * 1.3 * 2.5
        assert!(close(scores.get(Category::Food), 2.925));
    }

    #[test]
    fn dining_table_alone_is_not_boosted() {
        let stats = aggregate(&[Detection::new("dining table", 0.5)]);
        assert!(close(corrected_scores(&stats).get(Category::Food), 0.5));
    }
}

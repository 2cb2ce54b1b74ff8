use crate::models::classify_types::{
    Category, CategoryScores, ClassificationOutcome, Decision, Detection, PendingDecision,
};
use crate::services::classifier::aggregate::aggregate;
use crate::services::classifier::scoring::corrected_scores;

/// Highest-scoring category, or `None` when nothing has positive evidence.
/// Ties go to the category declared first. Non-finite scores never win.
pub fn select_category(scores: &CategoryScores) -> Option<Category> {
    let mut best: Option<(Category, f32)> = None;
    for (category, score) in scores.iter() {
        if !score.is_finite() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((category, score)),
        }
    }
    best.filter(|(_, score)| *score > 0.0).map(|(category, _)| category)
}

/// First phase: decide from detections alone.
pub fn classify(detections: Vec<Detection>) -> Decision {
    let stats = aggregate(&detections);
    let scores = corrected_scores(&stats);
    match select_category(&scores) {
        Some(category) => Decision::Resolved(ClassificationOutcome {
            category,
            detections,
            scores,
            is_manual: false,
        }),
        None => Decision::NeedsInput(PendingDecision { detections, scores }),
    }
}

/// Second phase: a human picked the category for an ambiguous image.
pub fn resolve(pending: PendingDecision, chosen: Category) -> ClassificationOutcome {
    ClassificationOutcome {
        category: chosen,
        detections: pending.detections,
        scores: pending.scores,
        is_manual: true,
    }
}

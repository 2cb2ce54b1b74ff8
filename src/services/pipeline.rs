//! Batch driver: detect, decide, store.
//!
//! Images with a confident category are classified and stored in parallel.
//! Ambiguous images are set aside and handed to the manual resolver one at a
//! time once the parallel pass is over, so a pending decision never holds up
//! the rest of the batch.

use crate::error::AppError;
use crate::models::classify_types::{
    BatchReport, BatchSummary, Category, ClassificationOutcome, ClassifyResult, Decision,
    Detection, PendingDecision,
};
use crate::services::classifier::decision;
use crate::services::classifier::detector::Detector;
use crate::services::storage::CategoryStore;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Manual decision boundary. Called once per ambiguous image and blocks
/// that image until a category is chosen.
pub trait ManualResolver: Send + Sync {
    fn resolve(&self, file_name: &str, pending: &PendingDecision) -> Result<Category, AppError>;
}

/// Sends every ambiguous image to the same category.
pub struct FixedResolver(pub Category);

impl ManualResolver for FixedResolver {
    fn resolve(&self, _file_name: &str, _pending: &PendingDecision) -> Result<Category, AppError> {
        Ok(self.0)
    }
}

/// Stops the batch before the next image; images already in flight finish.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum Stage {
    Done(ClassifyResult),
    Pending {
        bytes: Vec<u8>,
        pending: PendingDecision,
    },
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn base_result(path: &Path) -> ClassifyResult {
    ClassifyResult {
        file_name: file_name_of(path),
        file_path: path.to_string_lossy().to_string(),
        category: None,
        detections: Vec::new(),
        manual: false,
        stored_to: None,
        error: None,
        skipped: false,
    }
}

fn failed(path: &Path, detections: Vec<Detection>, error: AppError) -> ClassifyResult {
    warn!("Failed to process {}: {}", path.display(), error);
    ClassifyResult {
        detections,
        error: Some(error.message),
        ..base_result(path)
    }
}

fn skipped(path: &Path) -> ClassifyResult {
    ClassifyResult {
        skipped: true,
        ..base_result(path)
    }
}

fn store_outcome(
    store: &CategoryStore,
    path: &Path,
    bytes: &[u8],
    outcome: ClassificationOutcome,
) -> ClassifyResult {
    let file_name = file_name_of(path);
    let stored = store.place(outcome.category, bytes, &file_name);
    let mut result = ClassifyResult {
        category: Some(outcome.category),
        detections: outcome.detections,
        manual: outcome.is_manual,
        ..base_result(path)
    };
    match stored {
        Ok(stored_to) => {
            info!(
                "{} -> {} ({})",
                file_name,
                outcome.category,
                if outcome.is_manual { "manual" } else { "automatic" }
            );
            result.stored_to = Some(stored_to);
        }
        Err(e) => {
            warn!("Failed to store {}: {}", file_name, e);
            result.error = Some(e.message);
        }
    }
    result
}

fn detect_and_decide(
    path: &Path,
    detector: &dyn Detector,
    store: &CategoryStore,
) -> Stage {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            return Stage::Done(failed(
                path,
                Vec::new(),
                AppError {
                    message: format!("Failed to read {}: {}", path.display(), e),
                },
            ))
        }
    };

    let detections = match detector.detect(&bytes) {
        Ok(detections) => detections,
        Err(e) => return Stage::Done(failed(path, Vec::new(), e)),
    };

    match decision::classify(detections) {
        Decision::Resolved(outcome) => Stage::Done(store_outcome(store, path, &bytes, outcome)),
        Decision::NeedsInput(pending) => {
            info!("{} needs a manual category", file_name_of(path));
            Stage::Pending { bytes, pending }
        }
    }
}

fn summarize(results: &[ClassifyResult]) -> BatchSummary {
    let mut summary = BatchSummary {
        total: results.len(),
        ..BatchSummary::default()
    };
    for result in results {
        if result.skipped {
            summary.skipped += 1;
        } else if result.success() {
            summary.succeeded += 1;
            if result.manual {
                summary.ambiguous_resolved += 1;
            }
        } else {
            summary.failed += 1;
        }
    }
    summary
}

pub fn run_batch(
    paths: &[PathBuf],
    detector: &dyn Detector,
    resolver: &dyn ManualResolver,
    store: &CategoryStore,
    cancel: &CancelFlag,
) -> BatchReport {
    let total = paths.len();
    let current_count = AtomicUsize::new(0);

    let stages: Vec<Stage> = paths
        .par_iter()
        .map(|path| {
            if cancel.is_cancelled() {
                return Stage::Done(skipped(path));
            }
            let count = current_count.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Processing {} ({}/{})", file_name_of(path), count, total);
            detect_and_decide(path, detector, store)
        })
        .collect();

    let results: Vec<ClassifyResult> = stages
        .into_iter()
        .zip(paths)
        .map(|(stage, path)| match stage {
            Stage::Done(result) => result,
            Stage::Pending { bytes, pending } => {
                if cancel.is_cancelled() {
                    return skipped(path);
                }
                let detections = pending.detections.clone();
                match resolver.resolve(&file_name_of(path), &pending) {
                    Ok(category) => {
                        store_outcome(store, path, &bytes, decision::resolve(pending, category))
                    }
                    Err(e) => failed(path, detections, e),
                }
            }
        })
        .collect();

    let summary = summarize(&results);
    info!(
        "Batch done: {} stored, {} failed, {} resolved manually, {} skipped",
        summary.succeeded, summary.failed, summary.ambiguous_resolved, summary.skipped
    );
    BatchReport { results, summary }
}

/// Runs the batch on a blocking thread so the async caller stays responsive.
pub async fn classify_images(
    paths: Vec<PathBuf>,
    detector: Arc<dyn Detector>,
    resolver: Arc<dyn ManualResolver>,
    store: CategoryStore,
    cancel: CancelFlag,
) -> Result<BatchReport, AppError> {
    tokio::task::spawn_blocking(move || {
        run_batch(&paths, detector.as_ref(), resolver.as_ref(), &store, &cancel)
    })
    .await
    .map_err(|e| AppError {
        message: format!("Task join failed: {}", e),
    })
}

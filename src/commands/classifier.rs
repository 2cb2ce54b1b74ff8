use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::classify_types::{BatchReport, Category, CategoryScores, Decision, Detection, PendingDecision};
use crate::services::classifier::aggregate::aggregate;
use crate::services::classifier::decision;
use crate::services::classifier::model_manager::ModelManager;
use crate::services::classifier::scoring::{corrected_scores, raw_scores};
use crate::services::pipeline::{self, CancelFlag, FixedResolver, ManualResolver};
use crate::services::storage::{is_image_file, CategoryStore};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Asks on the terminal which category an ambiguous image belongs to.
/// Once the batch is cancelled it stops asking and leaves images unresolved.
pub struct StdinResolver {
    cancel: CancelFlag,
}

impl StdinResolver {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }

    fn cancelled(&self, file_name: &str) -> Result<(), AppError> {
        if self.cancel.is_cancelled() {
            return Err(format!("Interrupted before a category was chosen for {}", file_name).into());
        }
        Ok(())
    }
}

impl ManualResolver for StdinResolver {
    fn resolve(&self, file_name: &str, pending: &PendingDecision) -> Result<Category, AppError> {
        self.cancelled(file_name)?;
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();

        writeln!(stdout, "\nCould not classify {} automatically.", file_name)?;
        if pending.detections.is_empty() {
            writeln!(stdout, "No objects detected.")?;
        } else {
            writeln!(stdout, "Detected objects:")?;
            for det in &pending.detections {
                writeln!(stdout, "  - {}: {:.1}%", det.label, det.confidence * 100.0)?;
            }
        }
        for (i, category) in Category::ALL.iter().enumerate() {
            writeln!(stdout, "  [{}] {}", i + 1, category)?;
        }
        writeln!(stdout, "Press Ctrl-D to leave {} unsorted.", file_name)?;

        loop {
            write!(stdout, "Category for {}: ", file_name)?;
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Err(format!("No category chosen for {}", file_name).into());
            }
            self.cancelled(file_name)?;
            let answer = line.trim();
            if let Ok(n) = answer.parse::<usize>() {
                if let Some(category) = n.checked_sub(1).and_then(|i| Category::ALL.get(i)) {
                    return Ok(*category);
                }
            }
            match answer.parse::<Category>() {
                Ok(category) => return Ok(category),
                Err(e) => writeln!(stdout, "{}", e)?,
            }
        }
    }
}

/// Expands directories into the image files they directly contain.
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .map_err(|e| AppError {
                    message: format!("Cannot read directory {}: {}", input.display(), e),
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_file(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

pub async fn classify_images(
    config: &AppConfig,
    inputs: &[PathBuf],
    json: bool,
) -> Result<BatchReport, AppError> {
    let paths = collect_inputs(inputs)?;
    if paths.is_empty() {
        return Err("No images to classify".into());
    }

    let store = CategoryStore::new(&config.base_dir);
    store.ensure_layout()?;

    let detector = ModelManager::new(config.detector.clone()).load_detector().await?;
    let cancel = CancelFlag::new();
    let resolver: Arc<dyn ManualResolver> = match config.fallback_category {
        Some(category) => Arc::new(FixedResolver(category)),
        None => Arc::new(StdinResolver::new(cancel.clone())),
    };

    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; remaining images will be skipped (Ctrl-D ends an open prompt)");
            flag.cancel();
        }
    });

    let report =
        pipeline::classify_images(paths, Arc::new(detector), resolver, store, cancel).await?;
    print_report(&report, json)?;
    Ok(report)
}

fn print_report(report: &BatchReport, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for result in &report.results {
        let mode = if result.manual { "manual" } else { "automatic" };
        match (&result.stored_to, &result.error) {
            _ if result.skipped => println!("-  {} (skipped)", result.file_name),
            (Some(path), _) => println!(
                "ok {} -> {} [{}] {}",
                result.file_name,
                result.category.map(|c| c.name()).unwrap_or("?"),
                mode,
                path.display()
            ),
            (None, Some(err)) => println!("!! {}: {}", result.file_name, err),
            (None, None) => println!("!! {}", result.file_name),
        }
        if !result.detections.is_empty() {
            let labels: Vec<String> = result
                .detections
                .iter()
                .map(|d| format!("{} {:.0}%", d.label, d.confidence * 100.0))
                .collect();
            println!("   {}", labels.join(", "));
        }
    }

    let s = &report.summary;
    println!(
        "\n{} processed: {} stored, {} failed, {} resolved manually, {} skipped",
        s.total, s.succeeded, s.failed, s.ambiguous_resolved, s.skipped
    );
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub raw: CategoryScores,
    pub corrected: CategoryScores,
    pub category: Option<Category>,
}

pub fn score_detections(detections: Vec<Detection>) -> ScoreReport {
    let stats = aggregate(&detections);
    let raw = raw_scores(&stats);
    let corrected = corrected_scores(&stats);
    let category = match decision::classify(detections) {
        Decision::Resolved(outcome) => Some(outcome.category),
        Decision::NeedsInput(_) => None,
    };
    ScoreReport {
        raw,
        corrected,
        category,
    }
}

/// Scores a JSON list of `{label, confidence}` without running a model.
pub fn score_file(path: &Path, json: bool) -> Result<ScoreReport, AppError> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;
    let detections: Vec<Detection> = serde_json::from_str(&content)?;
    let report = score_detections(detections);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{:<12} {:>8} {:>10}", "category", "raw", "corrected");
        for ((category, raw), (_, corrected)) in report.raw.iter().zip(report.corrected.iter()) {
            println!("{:<12} {:>8.3} {:>10.3}", category.name(), raw, corrected);
        }
        match report.category {
            Some(category) => println!("decision: {}", category),
            None => println!("decision: ambiguous (needs a manual category)"),
        }
    }
    Ok(report)
}

use crate::config::DetectorConfig;
use crate::error::AppError;
use crate::services::classifier::detector::YoloDetector;
use ort::session::Session;
use std::path::Path;
use tracing::info;

/// Class names of the 80-class COCO detectors, in model output order.
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

#[derive(Clone)]
pub struct ModelManager {
    config: DetectorConfig,
}

impl ModelManager {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn model_exists(&self) -> bool {
        self.config.model_path.exists()
    }

    pub async fn load_labels(&self) -> Result<Vec<String>, AppError> {
        let Some(path) = &self.config.labels_path else {
            return Ok(COCO_LABELS.iter().map(|l| l.to_string()).collect());
        };
        let content = tokio::fs::read_to_string(path).await.map_err(|e| AppError {
            message: format!("Failed to read labels file {}: {}", path.display(), e),
        })?;
        parse_labels(&content).map_err(|e| AppError {
            message: format!("Failed to parse labels file {}: {}", path.display(), e),
        })
    }

    pub async fn load_detector(&self) -> Result<YoloDetector, AppError> {
        if !self.model_exists() {
            return Err(format!(
                "Detector model not found at {}",
                self.config.model_path.display()
            )
            .into());
        }

        let labels = self.load_labels().await?;
        let model_path = self.config.model_path.clone();
        let use_gpu = self.config.use_gpu;

        let session = tokio::task::spawn_blocking(move || build_session(&model_path, use_gpu))
            .await
            .map_err(|e| AppError {
                message: format!("Failed to spawn model loading task: {}", e),
            })??;

        info!(
            "Loaded detector {} ({} labels)",
            self.config.model_path.display(),
            labels.len()
        );
        Ok(YoloDetector::new(session, labels, &self.config))
    }
}

/// Accepts either a JSON array of names or an `{"id2label": {"0": ...}}` map.
pub fn parse_labels(content: &str) -> Result<Vec<String>, AppError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(list) = value.as_array() {
        return Ok(list
            .iter()
            .map(|v| v.as_str().unwrap_or("unknown").to_string())
            .collect());
    }

    let id2label = value["id2label"].as_object().ok_or_else(|| AppError {
        message: "Expected a JSON array or an id2label object".to_string(),
    })?;
    let mut labels: Vec<(usize, String)> = id2label
        .iter()
        .map(|(k, v)| {
            let idx = k.parse::<usize>().unwrap_or(usize::MAX);
            (idx, v.as_str().unwrap_or("unknown").to_string())
        })
        .collect();
    labels.sort_by_key(|(idx, _)| *idx);
    Ok(labels.into_iter().map(|(_, label)| label).collect())
}

fn build_session(model_path: &Path, use_gpu: bool) -> Result<Session, AppError> {
    let _ = ort::init().with_name("photo-sorter").commit();

    let mut builder = Session::builder()
        .map_err(|e| AppError { message: format!("Failed to create session builder: {}", e) })?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| AppError { message: format!("Failed to set optimization level: {}", e) })?
        .with_intra_threads(4)
        .map_err(|e| AppError { message: format!("Failed to set intra threads: {}", e) })?;

    if use_gpu {
        builder = builder
            .with_execution_providers([
                ort::execution_providers::CUDAExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| AppError { message: format!("Failed to register GPU execution providers: {}", e) })?;
    } else {
        builder = builder
            .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])
            .map_err(|e| AppError { message: format!("Failed to register CPU execution provider: {}", e) })?;
    }

    builder.commit_from_file(model_path).map_err(|e| AppError {
        message: format!("Failed to load ONNX model {}: {}", model_path.display(), e),
    })
}

use crate::config::DetectorConfig;
use crate::error::AppError;
use crate::models::classify_types::Detection;
use crate::services::classifier::inference;
use ort::session::Session;
use std::sync::Mutex;
use tracing::debug;

/// Object detector boundary: image bytes in, labeled detections out.
/// An empty list is a valid answer.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, AppError>;
}

/// YOLOv8-style ONNX model. Pre-processing runs on the caller's thread,
/// inference is serialized on the session lock.
pub struct YoloDetector {
    session: Mutex<Session>,
    labels: Vec<String>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl YoloDetector {
    pub fn new(session: Session, labels: Vec<String>, config: &DetectorConfig) -> Self {
        Self {
            session: Mutex::new(session),
            labels,
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        }
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, AppError> {
        let img = inference::decode_image(image)?;
        let tensor = inference::preprocess_image(&img, self.input_size)?;

        let (shape, data) = {
            let mut session = self.session.lock().map_err(|_| AppError {
                message: "Detector session lock poisoned".to_string(),
            })?;
            inference::run_inference_with_model(&mut session, tensor)?
        };

        let candidates = inference::decode_output(&shape, &data, self.confidence_threshold)?;
        let kept = inference::non_max_suppression(candidates, self.iou_threshold);
        debug!("Detector kept {} boxes", kept.len());
        Ok(inference::to_detections(&kept, &self.labels))
    }
}

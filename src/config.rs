use crate::error::AppError;
use crate::models::classify_types::Category;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DIR_NAME: &str = "photo-sorter";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    /// JSON array of class names; COCO names are used when absent.
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub use_gpu: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov8n.onnx"),
            labels_path: None,
            input_size: 640,
            confidence_threshold: 0.3,
            iou_threshold: 0.7,
            use_gpu: false,
        }
    }
}

impl DetectorConfig {
    /// Rejects values the detector cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.input_size == 0 {
            return Err("detector.input_size must be greater than 0".into());
        }
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("detector.{} must be within [0, 1], got {}", name, value).into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub base_dir: PathBuf,
    /// Category used for ambiguous images instead of asking.
    pub fallback_category: Option<Category>,
    pub detector: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join(DEFAULT_DIR_NAME),
            fallback_category: None,
            detector: DetectorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| AppError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;
        Self::parse(&content).map_err(|e| AppError {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        let config: Self = toml::from_str(content)?;
        config.detector.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(AppConfig::parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_detector_section() {
        let config = AppConfig::parse(
            r#"
            base_dir = "/srv/photos"
            fallback_category = "Technical"

            [detector]
            model_path = "models/yolov8s.onnx"
            confidence_threshold = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.base_dir, PathBuf::from("/srv/photos"));
        assert_eq!(config.fallback_category, Some(Category::Technical));
        assert_eq!(config.detector.model_path, PathBuf::from("models/yolov8s.onnx"));
        assert_eq!(config.detector.confidence_threshold, 0.5);
        assert_eq!(config.detector.input_size, 640);
        assert_eq!(config.detector.iou_threshold, 0.7);
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(AppConfig::parse("fallback_category = \"Cars\"").is_err());
    }

    #[test]
    fn rejects_zero_input_size() {
        let err = AppConfig::parse("[detector]\ninput_size = 0").unwrap_err();
        assert!(err.message.contains("input_size"));
    }

    #[test]
    fn rejects_thresholds_outside_unit_range() {
        assert!(AppConfig::parse("[detector]\nconfidence_threshold = 1.5").is_err());
        assert!(AppConfig::parse("[detector]\niou_threshold = -0.1").is_err());
        assert!(AppConfig::parse("[detector]\nconfidence_threshold = nan").is_err());
        assert!(AppConfig::parse("[detector]\niou_threshold = 1.0").is_ok());
    }
}

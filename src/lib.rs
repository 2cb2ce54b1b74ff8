pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{AppConfig, DetectorConfig};
pub use error::AppError;
pub use models::classify_types::{Category, Decision, Detection};
pub use services::classifier::decision::{classify, resolve};
pub use services::classifier::detector::Detector;
pub use services::pipeline::{CancelFlag, FixedResolver, ManualResolver};
pub use services::storage::CategoryStore;

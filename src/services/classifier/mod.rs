pub mod aggregate;
pub mod decision;
pub mod detector;
pub mod inference;
pub mod model_manager;
pub mod scoring;
pub mod taxonomy;

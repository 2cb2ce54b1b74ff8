pub mod classifier;
pub mod filesystem;

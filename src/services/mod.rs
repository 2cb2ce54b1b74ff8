pub mod classifier;
pub mod pipeline;
pub mod storage;
pub mod watcher;

use crate::models::classify_types::Category;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize, Clone)]
pub struct StoredImage {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Image count per category, in declaration order.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    pub counts: Vec<(Category, usize)>,
}

impl CategoryStats {
    pub fn count(&self, category: Category) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct DeleteFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct ClearReport {
    pub removed: usize,
    pub failures: Vec<DeleteFailure>,
}

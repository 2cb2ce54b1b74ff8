use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Fixed set of storage bins. Variant order is the declaration order used
/// for tie-breaking between equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Landscapes,
    People,
    Vehicles,
    Food,
    Technical,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Landscapes,
        Category::People,
        Category::Vehicles,
        Category::Food,
        Category::Technical,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Landscapes => "Landscapes",
            Category::People => "People",
            Category::Vehicles => "Vehicles",
            Category::Food => "Food",
            Category::Technical => "Technical",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
                format!("Unknown category '{}' (expected one of: {})", wanted, names.join(", "))
            })
    }
}

/// One object instance reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LabelStats {
    pub count: u32,
    pub total_confidence: f32,
}

impl LabelStats {
    pub fn mean_confidence(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.total_confidence / self.count as f32
        }
    }
}

/// Score per category, always holding all five categories.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryScores([f32; 5]);

impl CategoryScores {
    pub fn get(&self, category: Category) -> f32 {
        self.0[category.index()]
    }

    pub fn set(&mut self, category: Category, score: f32) {
        self.0[category.index()] = score;
    }

    pub fn add(&mut self, category: Category, amount: f32) {
        self.0[category.index()] += amount;
    }

    /// Iterates in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, f32)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl Serialize for CategoryScores {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(Category::ALL.len()))?;
        for (category, score) in self.iter() {
            map.serialize_entry(category.name(), &score)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationOutcome {
    pub category: Category,
    pub detections: Vec<Detection>,
    pub scores: CategoryScores,
    pub is_manual: bool,
}

/// An image the engine could not place on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDecision {
    pub detections: Vec<Detection>,
    pub scores: CategoryScores,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Resolved(ClassificationOutcome),
    NeedsInput(PendingDecision),
}

#[derive(Debug, Serialize, Clone)]
pub struct ClassifyResult {
    pub file_name: String,
    pub file_path: String,
    pub category: Option<Category>,
    pub detections: Vec<Detection>,
    pub manual: bool,
    pub stored_to: Option<PathBuf>,
    pub error: Option<String>,
    pub skipped: bool,
}

impl ClassifyResult {
    pub fn success(&self) -> bool {
        self.stored_to.is_some()
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub ambiguous_resolved: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct BatchReport {
    pub results: Vec<ClassifyResult>,
    pub summary: BatchSummary,
}

use crate::models::classify_types::Category;

// COCO labels per category. A label appears in at most one list.
const LANDSCAPE_LABELS: &[&str] = &[
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe",
    "backpack", "umbrella", "potted plant", "bench", "kite", "sports ball",
];

const PEOPLE_LABELS: &[&str] = &["person"];

const VEHICLE_LABELS: &[&str] = &[
    "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "parking meter",
];

const FOOD_LABELS: &[&str] = &[
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake",
    "dining table",
];

const TECHNICAL_LABELS: &[&str] = &[
    "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave", "oven",
    "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors", "teddy bear",
    "hair drier", "toothbrush", "chair", "couch", "bed", "toilet", "fire hydrant",
    "stop sign", "frisbee", "skis", "snowboard", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "handbag", "tie", "suitcase",
];

/// Labels whose mere presence is strong evidence of a food picture.
/// Deliberately excludes "dining table".
pub const FOOD_INDICATOR_LABELS: &[&str] = &[
    "bowl", "cup", "fork", "knife", "spoon", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "wine glass", "bottle",
];

pub const PERSON_LABEL: &str = "person";

pub fn labels_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Landscapes => LANDSCAPE_LABELS,
        Category::People => PEOPLE_LABELS,
        Category::Vehicles => VEHICLE_LABELS,
        Category::Food => FOOD_LABELS,
        Category::Technical => TECHNICAL_LABELS,
    }
}

/// Category a detector label belongs to, if any. Case-insensitive.
pub fn category_of(label: &str) -> Option<Category> {
    let label = label.to_lowercase();
    Category::ALL
        .into_iter()
        .find(|c| labels_for(*c).contains(&label.as_str()))
}

pub fn is_food_indicator(label: &str) -> bool {
    FOOD_INDICATOR_LABELS.contains(&label.to_lowercase().as_str())
}

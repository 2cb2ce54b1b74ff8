use crate::error::AppError;
use crate::models::classify_types::Detection;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

// Grey used by YOLO letterboxing.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Number of box coordinates ahead of the class scores in each prediction.
const BOX_FIELDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCandidate {
    pub class_id: usize,
    pub score: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoxCandidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes).map_err(|e| AppError {
        message: format!("Failed to decode image: {}", e),
    })
}

/// Size of the image once fitted inside a `size` x `size` square.
pub fn letterbox_dims(width: u32, height: u32, size: u32) -> (u32, u32) {
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let max = size.max(1);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, max);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, max);
    (new_w, new_h)
}

/// Aspect-preserving resize into a padded square, normalized to [0, 1], NCHW.
pub fn preprocess_image(img: &DynamicImage, input_size: u32) -> Result<Array4<f32>, AppError> {
    if input_size == 0 {
        return Err("Detector input size must be greater than 0".into());
    }
    if img.width() == 0 || img.height() == 0 {
        return Err("Image has no pixels".into());
    }
    let (new_w, new_h) = letterbox_dims(img.width(), img.height(), input_size);
    let rgb = img
        .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let size = input_size as usize;
    let hw = size * size;
    let pad_x = ((input_size - new_w) / 2) as usize;
    let pad_y = ((input_size - new_h) / 2) as usize;

    let mut data = vec![PAD_VALUE; 3 * hw];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let i = (y as usize + pad_y) * size + x as usize + pad_x;
        data[i] = pixel[0] as f32 / 255.0;
        data[hw + i] = pixel[1] as f32 / 255.0;
        data[2 * hw + i] = pixel[2] as f32 / 255.0;
    }

    Array4::from_shape_vec((1, 3, size, size), data).map_err(|e| AppError {
        message: format!("Failed to create tensor: {}", e),
    })
}

/// Runs the session and returns the first output as (shape, values).
pub fn run_inference_with_model(
    model: &mut Session,
    input: Array4<f32>,
) -> Result<(Vec<usize>, Vec<f32>), AppError> {
    let input_name = model.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input).map_err(|e| AppError {
        message: format!("Failed to create tensor value: {}", e),
    })?;

    let outputs = model
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError {
            message: format!("Inference failed: {}", e),
        })?;

    let output_value = outputs.values().next().ok_or_else(|| AppError {
        message: "Model produced no outputs".to_string(),
    })?;

    let (shape, data) = output_value.try_extract_tensor::<f32>().map_err(|e| AppError {
        message: format!("Failed to extract output tensor: {}", e),
    })?;

    let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    Ok((shape, data.to_vec()))
}

/// Reads a YOLOv8-style output, `[1, 4 + classes, anchors]` or its transpose,
/// keeping the best class of every anchor at or above `conf_threshold`.
pub fn decode_output(
    shape: &[usize],
    data: &[f32],
    conf_threshold: f32,
) -> Result<Vec<BoxCandidate>, AppError> {
    let (rows, cols) = match shape {
        [1, rows, cols] => (*rows, *cols),
        [rows, cols] => (*rows, *cols),
        _ => return Err(format!("Unexpected detector output shape {:?}", shape).into()),
    };
    if rows * cols != data.len() {
        return Err(format!(
            "Output shape {:?} does not match {} values",
            shape,
            data.len()
        )
        .into());
    }

    // Anchors outnumber fields in every YOLO export.
    let fields_first = rows <= cols;
    let (fields, anchors) = if fields_first { (rows, cols) } else { (cols, rows) };
    if fields <= BOX_FIELDS {
        return Err(format!("Output shape {:?} has no class scores", shape).into());
    }
    let value = |field: usize, anchor: usize| {
        if fields_first {
            data[field * anchors + anchor]
        } else {
            data[anchor * fields + field]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::NEG_INFINITY;
        for class_id in 0..fields - BOX_FIELDS {
            let score = value(BOX_FIELDS + class_id, anchor);
            if score > best_score {
                best_score = score;
                best_class = class_id;
            }
        }
        if best_score < conf_threshold {
            continue;
        }

        let (cx, cy) = (value(0, anchor), value(1, anchor));
        let (w, h) = (value(2, anchor), value(3, anchor));
        candidates.push(BoxCandidate {
            class_id: best_class,
            score: best_score,
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        });
    }
    Ok(candidates)
}

pub fn iou(a: &BoxCandidate, b: &BoxCandidate) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Class-aware NMS: a box is dropped only by a stronger box of its own class.
pub fn non_max_suppression(mut candidates: Vec<BoxCandidate>, iou_threshold: f32) -> Vec<BoxCandidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<BoxCandidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

pub fn to_detections(boxes: &[BoxCandidate], labels: &[String]) -> Vec<Detection> {
    boxes
        .iter()
        .map(|b| {
            let label = labels
                .get(b.class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", b.class_id));
            Detection {
                label,
                confidence: b.score.clamp(0.0, 1.0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn candidate(class_id: usize, score: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> BoxCandidate {
        BoxCandidate {
            class_id,
            score,
            x1,
            y1,
            x2,
            y2,
        }
    }

    #[test]
    fn letterbox_keeps_aspect_ratio() {
        assert_eq!(letterbox_dims(1280, 640, 640), (640, 320));
        assert_eq!(letterbox_dims(300, 600, 640), (320, 640));
        assert_eq!(letterbox_dims(10_000, 1, 640), (640, 1));
    }

    #[test]
    fn preprocess_pads_with_grey() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([255, 0, 0])));
        let tensor = preprocess_image(&img, 8).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);

        // Rows 0-1 and 6-7 are padding, rows 2-5 hold the image.
        assert!((tensor[[0, 0, 0, 0]] - PAD_VALUE).abs() < 1e-6);
        assert!((tensor[[0, 0, 7, 7]] - PAD_VALUE).abs() < 1e-6);
        assert!((tensor[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 3, 3]].abs() < 1e-6);
    }

    #[test]
    fn zero_input_size_is_an_error() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([255, 0, 0])));
        assert!(preprocess_image(&img, 0).is_err());
        assert_eq!(letterbox_dims(8, 4, 0), (1, 1));
    }

    #[test]
    fn decodes_fields_first_layout() {
        // 2 classes, 7 anchors: rows are cx, cy, w, h, class0, class1.
        let data = vec![
            10.0, 50.0, 90.0, 30.0, 70.0, 20.0, 40.0, // cx
            10.0, 50.0, 90.0, 30.0, 70.0, 20.0, 40.0, // cy
            4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, // w
            4.0, 4.0, 4.0, 4.0, 4.0, 4.0, 4.0, // h
            0.9, 0.1, 0.2, 0.0, 0.0, 0.0, 0.0, // class 0
            0.05, 0.2, 0.6, 0.0, 0.0, 0.0, 0.0, // class 1
        ];
        let boxes = decode_output(&[1, 6, 7], &data, 0.3).unwrap();

        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert!((boxes[0].score - 0.9).abs() < 1e-6);
        assert!((boxes[0].x1 - 8.0).abs() < 1e-6);
        assert!((boxes[0].x2 - 12.0).abs() < 1e-6);
        assert_eq!(boxes[1].class_id, 1);
        assert!((boxes[1].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn decodes_anchors_first_layout() {
        let data = vec![
            10.0, 10.0, 4.0, 4.0, 0.1, 0.8, // anchor 0
            50.0, 50.0, 4.0, 4.0, 0.2, 0.1, // anchor 1
            90.0, 90.0, 4.0, 4.0, 0.7, 0.3, // anchor 2
            30.0, 30.0, 4.0, 4.0, 0.0, 0.0, // anchor 3
            70.0, 70.0, 4.0, 4.0, 0.0, 0.0, // anchor 4
            20.0, 20.0, 4.0, 4.0, 0.0, 0.0, // anchor 5
            40.0, 40.0, 4.0, 4.0, 0.0, 0.0, // anchor 6
        ];
        let boxes = decode_output(&[1, 7, 6], &data, 0.5).unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 1);
        assert_eq!(boxes[1].class_id, 0);
    }

    #[test]
    fn rejects_mismatched_output() {
        assert!(decode_output(&[1, 6, 3], &[0.0; 5], 0.3).is_err());
        assert!(decode_output(&[1, 2, 3, 4], &[0.0; 24], 0.3).is_err());
        assert!(decode_output(&[1, 4, 10], &[0.0; 40], 0.3).is_err());
    }

    #[test]
    fn nms_drops_overlapping_same_class() {
        let boxes = vec![
            candidate(0, 0.8, 0.0, 0.0, 10.0, 10.0),
            candidate(0, 0.9, 1.0, 1.0, 11.0, 11.0),
            candidate(1, 0.7, 0.0, 0.0, 10.0, 10.0),
            candidate(0, 0.6, 50.0, 50.0, 60.0, 60.0),
        ];
        let kept = non_max_suppression(boxes, 0.5);

        assert_eq!(kept.len(), 3);
        assert!((kept[0].score - 0.9).abs() < 1e-6);
        assert!(kept.iter().any(|b| b.class_id == 1));
        assert!(kept.iter().any(|b| b.x1 == 50.0));
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = candidate(0, 1.0, 0.0, 0.0, 1.0, 1.0);
        let b = candidate(0, 1.0, 2.0, 2.0, 3.0, 3.0);
        assert_eq!(iou(&a, &b), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_class_ids_get_placeholder_labels() {
        let labels = vec!["person".to_string()];
        let detections = to_detections(
            &[
                candidate(0, 0.5, 0.0, 0.0, 1.0, 1.0),
                candidate(7, 0.4, 0.0, 0.0, 1.0, 1.0),
            ],
            &labels,
        );
        assert_eq!(detections[0].label, "person");
        assert_eq!(detections[1].label, "class_7");
    }
}

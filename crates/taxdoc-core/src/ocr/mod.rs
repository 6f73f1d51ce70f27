//! OCR over page and photo images using `pure-onnx-ocr`.

mod engine;

pub use engine::OcrEngine;

use serde::{Deserialize, Serialize};

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of OCR processing on an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized text boxes in detection order.
    pub boxes: Vec<TextBox>,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrResult {
    /// Create an empty result.
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            boxes: Vec::new(),
            processing_time_ms: 0,
            image_size: (width, height),
        }
    }

    /// Non-blank fragment texts, one per box, in detection order.
    pub fn text_items(&self) -> Vec<String> {
        self.boxes
            .iter()
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Group boxes into visual lines.
    ///
    /// Boxes whose top edges lie within `tolerance` pixels of the line's first
    /// box share a line. Lines run top to bottom, cells left to right.
    pub fn lines(&self, tolerance: f32) -> Vec<Vec<String>> {
        let mut boxes: Vec<(f32, f32, &str)> = self
            .boxes
            .iter()
            .filter(|b| !b.text.trim().is_empty())
            .map(|b| {
                let (x, y, _, _) = b.rect();
                (y, x, b.text.trim())
            })
            .collect();
        boxes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut lines: Vec<Vec<(f32, &str)>> = Vec::new();
        let mut current_y = f32::NEG_INFINITY;

        for (y, x, text) in boxes {
            match lines.last_mut() {
                Some(line) if (y - current_y).abs() < tolerance => line.push((x, text)),
                _ => {
                    lines.push(vec![(x, text)]);
                    current_y = y;
                }
            }
        }

        lines
            .into_iter()
            .map(|mut line| {
                line.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                line.into_iter().map(|(_, t)| t.to_string()).collect()
            })
            .collect()
    }

    /// Text in reading order: one output line per visual line.
    pub fn reading_order_text(&self, tolerance: f32) -> String {
        self.lines(tolerance)
            .iter()
            .map(|cells| cells.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, text: &str) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 12.0, x, y + 12.0],
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    fn sample() -> OcrResult {
        OcrResult {
            boxes: vec![
                text_box(200.0, 52.0, "£2,500.00"),
                text_box(10.0, 10.0, "ACME Ltd"),
                text_box(10.0, 50.0, "Gross pay"),
                text_box(10.0, 90.0, "   "),
            ],
            processing_time_ms: 5,
            image_size: (400, 200),
        }
    }

    #[test]
    fn test_text_items_keep_detection_order() {
        assert_eq!(
            sample().text_items(),
            vec!["£2,500.00", "ACME Ltd", "Gross pay"]
        );
    }

    #[test]
    fn test_lines_group_by_vertical_position() {
        assert_eq!(
            sample().lines(15.0),
            vec![
                vec!["ACME Ltd".to_string()],
                vec!["Gross pay".to_string(), "£2,500.00".to_string()],
            ]
        );
        assert_eq!(sample().reading_order_text(15.0), "ACME Ltd\nGross pay £2,500.00");
    }

    #[test]
    fn test_rect() {
        let b = text_box(3.0, 4.0, "x");
        assert_eq!(b.rect(), (3.0, 4.0, 53.0, 16.0));
    }

    #[test]
    fn test_empty() {
        let result = OcrResult::empty(10, 20);
        assert!(result.text_items().is_empty());
        assert!(result.lines(15.0).is_empty());
        assert_eq!(result.image_size, (10, 20));
    }
}

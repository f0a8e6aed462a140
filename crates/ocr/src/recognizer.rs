use image::GrayImage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image encode error: {0}")]
    ImageEncode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

/// One text fragment reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Corner points in image pixels.
    pub polygon: [(f32, f32); 4],
    pub text: String,
    pub confidence: f32,
}

impl RawDetection {
    pub fn new(polygon: [(f32, f32); 4], text: impl Into<String>, confidence: f32) -> Self {
        Self { polygon, text: text.into(), confidence }
    }

    /// Axis-aligned box from its top-left corner and size.
    pub fn from_box(left: f32, top: f32, width: f32, height: f32, text: impl Into<String>) -> Self {
        let (right, bottom) = (left + width, top + height);
        Self::new(
            [(left, top), (right, top), (right, bottom), (left, bottom)],
            text,
            1.0,
        )
    }

    pub fn center_y(&self) -> f32 {
        self.polygon.iter().map(|p| p.1).sum::<f32>() / 4.0
    }

    pub fn left_x(&self) -> f32 {
        self.polygon.iter().map(|p| p.0).fold(f32::INFINITY, f32::min)
    }
}

/// Abstraction over a text detection + recognition engine.
/// Implementations receive the binarized receipt and return every fragment found.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Result<Vec<RawDetection>, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns pre-set detections, useful for exercising the pipeline without a
/// real engine installed.
pub struct MockRecognizer {
    detections: Result<Vec<RawDetection>, String>,
}

impl MockRecognizer {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections: Ok(detections) }
    }

    /// One detection per line, stacked 30px apart.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let detections = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| RawDetection::from_box(10.0, 10.0 + 30.0 * i as f32, 200.0, 20.0, text))
            .collect();
        Self::new(detections)
    }

    /// An engine that fails on every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { detections: Err(message.into()) }
    }
}

impl TextDetector for MockRecognizer {
    fn detect(&self, _image: &GrayImage) -> Result<Vec<RawDetection>, OcrError> {
        self.detections.clone().map_err(OcrError::Engine)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrError, RawDetection, TextDetector};
    use crate::preprocess::encode_png;
    use image::GrayImage;
    use leptess::LepTess;

    /// Word-level detections parsed from Tesseract's TSV output.
    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl TextDetector for TesseractRecognizer {
        fn detect(&self, image: &GrayImage) -> Result<Vec<RawDetection>, OcrError> {
            let png = encode_png(image).map_err(|e| OcrError::ImageEncode(e.to_string()))?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let tsv = lt.get_tsv_text(0).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(parse_tsv(&tsv))
        }
    }

    /// Columns: level page block par line word left top width height conf text.
    /// Only word rows (level 5) with text are kept.
    fn parse_tsv(tsv: &str) -> Vec<RawDetection> {
        tsv.lines()
            .filter_map(|row| {
                let cols: Vec<&str> = row.splitn(12, '\t').collect();
                if cols.len() < 12 || cols[0] != "5" || cols[11].trim().is_empty() {
                    return None;
                }
                let num = |i: usize| cols[i].trim().parse::<f32>().ok();
                let mut det = RawDetection::from_box(num(6)?, num(7)?, num(8)?, num(9)?, cols[11].trim());
                det.confidence = num(10)? / 100.0;
                Some(det)
            })
            .collect()
    }

}

// ── Line assembly ─────────────────────────────────────────────────────────────

fn re_long_digits() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\b\d+\b").expect("invalid regex"))
}

/// Group detections into top-to-bottom text lines.
///
/// Detections are sorted by vertical center; one whose center is more than
/// `line_gap` away from the running mean center of the current line starts a
/// new line. Fragments in a line are joined left to right with single spaces,
/// digit runs of `barcode_min_digits` or more are removed, and empty lines
/// are dropped.
pub fn group_into_lines(
    detections: &[RawDetection],
    line_gap: f32,
    barcode_min_digits: usize,
) -> Vec<String> {
    let mut sorted: Vec<&RawDetection> = detections.iter().collect();
    sorted.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut groups: Vec<Vec<&RawDetection>> = Vec::new();
    let mut center_sum = 0.0f32;
    for det in sorted {
        let y = det.center_y();
        match groups.last_mut() {
            Some(group) if (y - center_sum / group.len() as f32).abs() <= line_gap => {
                group.push(det);
                center_sum += y;
            }
            _ => {
                groups.push(vec![det]);
                center_sum = y;
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|mut group| {
            group.sort_by(|a, b| a.left_x().total_cmp(&b.left_x()));
            let joined = group.iter().map(|d| d.text.as_str()).collect::<Vec<_>>().join(" ");
            let line = strip_long_digit_runs(&joined, barcode_min_digits);
            (!line.is_empty()).then_some(line)
        })
        .collect()
}

fn strip_long_digit_runs(text: &str, min_digits: usize) -> String {
    let stripped = re_long_digits().replace_all(text, |caps: &regex::Captures| {
        let run = &caps[0];
        if run.chars().count() >= min_digits {
            String::new()
        } else {
            run.to_string()
        }
    });
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Runs the engine once per image and reduces its output to text lines.
pub struct OcrAdapter<D: TextDetector> {
    detector: D,
    line_gap: f32,
    barcode_min_digits: usize,
}

impl<D: TextDetector> OcrAdapter<D> {
    pub fn new(detector: D, line_gap: f32, barcode_min_digits: usize) -> Self {
        Self { detector, line_gap, barcode_min_digits }
    }

    /// Ordered text lines. An engine failure is logged and yields no lines.
    pub fn read_lines(&self, image: &GrayImage) -> Vec<String> {
        match self.detector.detect(image) {
            Ok(detections) => {
                let lines = group_into_lines(&detections, self.line_gap, self.barcode_min_digits);
                debug!(detections = detections.len(), lines = lines.len(), "OCR complete");
                lines
            }
            Err(e) => {
                warn!("OCR engine failed, treating receipt as empty: {e}");
                Vec::new()
            }
        }
    }
}

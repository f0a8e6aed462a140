pub mod config;
pub mod extract;
pub mod hash;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod types;

pub use config::{ConfigError, PipelineConfig, RectifierConfig, SpacedThousands};
pub use extract::ItemExtractor;
pub use hash::{content_id, sha256_bytes, to_hex};
pub use normalize::TextNormalizer;
pub use pipeline::{PipelineError, ReceiptPipeline};
pub use preprocess::{rectify, rectify_bytes, rectify_file, RectifyError};
pub use recognizer::{
    group_into_lines, MockRecognizer, OcrAdapter, OcrError, RawDetection, TextDetector,
};
pub use types::{BatchEntry, BatchReport, ReceiptStatus};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;

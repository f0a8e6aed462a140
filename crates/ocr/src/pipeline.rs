use nbbang_core::ExtractionResult;
use nbbang_match::{DictionaryError, FuzzyMatcher, StoreMenu, Vocabulary};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, PipelineConfig, RectifierConfig};
use crate::extract::ItemExtractor;
use crate::hash;
use crate::normalize::TextNormalizer;
use crate::preprocess::{self, RectifyError};
use crate::recognizer::{OcrAdapter, TextDetector};
use crate::types::{BatchEntry, BatchReport, ReceiptStatus};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Rectify(#[from] RectifyError),
    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Orchestrates: rectify → OCR → normalize → extract, one receipt at a time.
pub struct ReceiptPipeline<D: TextDetector> {
    ocr: OcrAdapter<D>,
    normalizer: TextNormalizer,
    extractor: ItemExtractor,
    menu: StoreMenu,
    rectifier: RectifierConfig,
}

impl<D: TextDetector> ReceiptPipeline<D> {
    pub fn new(detector: D, vocabulary: Vocabulary, menu: StoreMenu, config: &PipelineConfig) -> Self {
        let matcher = FuzzyMatcher::new(
            config.correction_threshold,
            config.store_threshold,
            config.item_threshold,
        );
        Self {
            ocr: OcrAdapter::new(detector, config.line_gap_px, config.barcode_min_digits),
            normalizer: TextNormalizer::new(vocabulary, matcher.clone(), config.spaced_thousands),
            extractor: ItemExtractor::new(matcher, config.max_item_line_gap),
            menu,
            rectifier: config.rectifier.clone(),
        }
    }

    /// Validate `config` and load the dictionaries it names. Unset paths and
    /// missing files give empty dictionaries.
    pub fn from_config(detector: D, config: &PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let vocabulary = match &config.vocabulary_path {
            Some(path) => Vocabulary::load(path)?,
            None => Vocabulary::default(),
        };
        let menu = match &config.menu_path {
            Some(path) => StoreMenu::load(path)?,
            None => StoreMenu::default(),
        };
        if menu.is_empty() {
            warn!("Store menu is empty; no items can be extracted");
        }
        Ok(Self::new(detector, vocabulary, menu, config))
    }

    pub fn menu(&self) -> &StoreMenu {
        &self.menu
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Process a receipt image on disk.
    pub fn process_file(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        let bytes = read_file(path)?;
        self.process_bytes(&bytes)
    }

    /// Process an encoded image (JPEG / PNG / …).
    pub fn process_bytes(&self, data: &[u8]) -> Result<ExtractionResult, PipelineError> {
        let rectified = preprocess::rectify_bytes(data, &self.rectifier)?;
        let lines = self.ocr.read_lines(&rectified);
        Ok(self.process_lines(&lines))
    }

    /// Normalize and extract already-recognised text lines.
    pub fn process_lines<S: AsRef<str>>(&self, lines: &[S]) -> ExtractionResult {
        let normalized = self.normalizer.process_lines(lines);
        self.extractor.extract(&normalized, &self.menu)
    }

    /// Process every file, never stopping at a bad one. Files whose content
    /// was already seen in this batch are skipped as duplicates.
    pub fn process_batch<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let mut seen = HashSet::new();
        let entries = paths
            .iter()
            .map(|p| self.batch_entry(p.as_ref(), &mut seen))
            .collect();
        let report = BatchReport::new(entries);
        info!(parsed = report.parsed, skipped = report.skipped, "Batch complete");
        report
    }

    fn batch_entry(&self, path: &Path, seen: &mut HashSet<String>) -> BatchEntry {
        let mut entry = BatchEntry {
            source: path.to_path_buf(),
            hash_hex: String::new(),
            status: ReceiptStatus::Parsed,
            result: None,
        };

        let bytes = match read_file(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping receipt: {e}");
                entry.status = ReceiptStatus::skipped(e.to_string());
                return entry;
            }
        };
        entry.hash_hex = hash::content_id(&bytes);
        if !seen.insert(entry.hash_hex.clone()) {
            info!(source = %path.display(), hash = %entry.hash_hex, "Duplicate receipt skipped");
            entry.status = ReceiptStatus::skipped("duplicate");
            return entry;
        }

        match self.process_bytes(&bytes) {
            Ok(result) => {
                info!(
                    source = %path.display(),
                    store = result.store_name.as_deref().unwrap_or("-"),
                    items = result.items.len(),
                    "Receipt parsed"
                );
                entry.result = Some(result);
            }
            Err(e) => {
                warn!(source = %path.display(), "Skipping receipt: {e}");
                entry.status = ReceiptStatus::skipped(e.to_string());
            }
        }
        entry
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, PipelineError> {
    std::fs::read(path).map_err(|source| PipelineError::Io {
        path: path.display().to_string(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

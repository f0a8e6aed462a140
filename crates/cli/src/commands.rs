use anyhow::{Context, Result};
use image::GrayImage;
use nbbang_core::{equal_split, itemized_split, AssignedItem, ExtractionResult, RemainderPolicy};
use nbbang_match::Dictionary;
use nbbang_ocr::{
    BatchReport, OcrError, PipelineConfig, RawDetection, ReceiptPipeline, TextDetector,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{DictionaryArgs, EngineArgs, Remainder};

/// Config file (or defaults) with dictionary paths from the command line on top.
pub fn load_config(path: Option<&Path>, dictionaries: &DictionaryArgs) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(vocabulary) = &dictionaries.vocabulary {
        config.vocabulary_path = Some(vocabulary.clone());
    }
    if let Some(menu) = &dictionaries.menu {
        config.menu_path = Some(menu.clone());
    }
    Ok(config)
}

pub fn process(config: &PipelineConfig, images: &[PathBuf], engine: &EngineArgs) -> Result<()> {
    #[cfg(feature = "tesseract")]
    {
        let detector = nbbang_ocr::TesseractRecognizer::new(engine.tessdata.clone(), &engine.lang);
        let pipeline = ReceiptPipeline::from_config(detector, config)?;
        print_json(&pipeline.process_batch(images))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        let _ = (config, images, engine);
        Err(OcrError::NotAvailable).context("`nbbang process` needs an OCR engine")
    }
}

/// Stand-in engine for the text-only commands, which never look at an image.
struct NoEngine;

impl TextDetector for NoEngine {
    fn detect(&self, _image: &GrayImage) -> Result<Vec<RawDetection>, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

fn text_pipeline(config: &PipelineConfig) -> Result<ReceiptPipeline<NoEngine>> {
    ReceiptPipeline::from_config(NoEngine, config).context("loading dictionaries")
}

fn read_lines(input: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    Ok(text.lines().map(str::to_string).collect())
}

pub fn extract(config: &PipelineConfig, input: &Path) -> Result<()> {
    let pipeline = text_pipeline(config)?;
    let lines = read_lines(input)?;
    print_json(&pipeline.process_lines(&lines))
}

pub fn normalize(config: &PipelineConfig, input: &Path) -> Result<()> {
    let pipeline = text_pipeline(config)?;
    let lines = read_lines(input)?;
    for line in pipeline.normalizer().process_lines(&lines) {
        println!("{line}");
    }
    Ok(())
}

pub fn describe_dictionary(path: &Path) -> Result<()> {
    let dictionary = Dictionary::load(path).with_context(|| format!("loading {}", path.display()))?;
    match &dictionary {
        Dictionary::Vocabulary(vocabulary) => {
            println!("vocabulary: {} terms", vocabulary.len());
        }
        Dictionary::StoreMenu(menu) => {
            println!("store menu: {} stores, {} items", menu.store_count(), menu.item_count());
            for store in menu.store_names() {
                let items = menu.items(store).map_or(0, <[String]>::len);
                println!("  {store}: {items} items");
            }
        }
    }
    if dictionary.is_empty() {
        tracing::warn!(path = %path.display(), "Dictionary is empty");
    }
    Ok(())
}

/// Accepted shapes for `--receipts`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReceiptsFile {
    Report(BatchReport),
    Many(Vec<ExtractionResult>),
    One(ExtractionResult),
}

impl ReceiptsFile {
    fn into_results(self) -> Vec<ExtractionResult> {
        match self {
            ReceiptsFile::Report(report) => report.results().cloned().collect(),
            ReceiptsFile::Many(results) => results,
            ReceiptsFile::One(result) => vec![result],
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_receipts(path: &Path) -> Result<Vec<ExtractionResult>> {
    Ok(read_json::<ReceiptsFile>(path)?.into_results())
}

pub fn settle(
    receipts: Option<&Path>,
    equal: &[String],
    assignments: Option<&Path>,
    remainder: Remainder,
) -> Result<()> {
    let policy = match remainder {
        Remainder::Unallocated => RemainderPolicy::Unallocated,
        Remainder::First => RemainderPolicy::FirstParticipant,
    };
    let settlement = match (assignments, receipts) {
        (Some(path), _) => {
            let items: Vec<AssignedItem> = read_json(path)?;
            itemized_split(&items, policy)?
        }
        (None, Some(path)) => equal_split(&load_receipts(path)?, equal, policy)?,
        (None, None) => anyhow::bail!("either --assignments or --receipts with --equal is required"),
    };
    if !settlement.unallocated.is_zero() {
        tracing::warn!(unallocated = %settlement.unallocated, "Remainder left unallocated");
    }
    print_json(&settlement)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

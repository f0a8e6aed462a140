use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Threshold `{name}` must be within 0.0..=1.0, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// What to do with `ddd ddd` when the right group is not `000`: it may be one
/// number split by OCR or two adjacent numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacedThousands {
    /// Keep the space; only `ddd 000` is merged.
    #[default]
    PreserveAmbiguous,
    /// Always read as a single number.
    AlwaysMerge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifierConfig {
    /// Smallest contour area, as a fraction of the image, accepted as the receipt.
    pub min_region_fraction: f64,
    /// Closing kernel is `width / closing_divisor` by `height / closing_divisor`.
    pub closing_divisor: u32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Paper mask is the inverse Otsu threshold of the photo.
    pub invert_mask: bool,
}

impl Default for RectifierConfig {
    fn default() -> Self {
        Self {
            min_region_fraction: 0.5,
            closing_divisor: 20,
            approx_epsilon_ratio: 0.02,
            invert_mask: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub vocabulary_path: Option<PathBuf>,
    pub menu_path: Option<PathBuf>,
    pub correction_threshold: f64,
    pub store_threshold: f64,
    pub item_threshold: f64,
    /// Vertical distance in pixels beyond which a detection starts a new line.
    pub line_gap_px: f32,
    /// Digit runs at least this long are dropped as barcodes.
    pub barcode_min_digits: usize,
    /// Item scanning stops this many lines after the last matched item.
    pub max_item_line_gap: usize,
    pub spaced_thousands: SpacedThousands,
    pub rectifier: RectifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vocabulary_path: None,
            menu_path: None,
            correction_threshold: 0.70,
            store_threshold: 0.4,
            item_threshold: 0.4,
            line_gap_px: 15.0,
            barcode_min_digits: 10,
            max_item_line_gap: 2,
            spaced_thousands: SpacedThousands::default(),
            rectifier: RectifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(toml_content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("correction_threshold", self.correction_threshold),
            ("store_threshold", self.store_threshold),
            ("item_threshold", self.item_threshold),
            ("rectifier.min_region_fraction", self.rectifier.min_region_fraction),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

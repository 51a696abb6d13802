//! File-backed scans and JSON driven batch runs.

use crate::core::{GrayImage, RasterGeometry, RasterParams};
use crate::recognize::{
    recognize_sheets, ConfigIoError, LayoutError, RecognitionReport, ScannedImage, Sheet,
    SurfaceError, SurfaceSource, SurveyDefinition,
};
use serde::{Deserialize, Serialize};
use sheetscan_core::PageSurface;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the scan helpers.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigIoError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("resolution must be > 0 dpi (got {0})")]
    InvalidDpi(f64),
    #[error("sheet {index} lists no images")]
    EmptySheet { index: usize },
}

/// Decode `path` into a grayscale page.
pub fn load_gray_image(path: impl AsRef<Path>) -> Result<GrayImage, ScanError> {
    let luma = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .to_luma8();
    Ok(gray_from_luma(luma))
}

/// Take over the pixels of an `image::GrayImage`.
pub fn gray_from_luma(luma: image::GrayImage) -> GrayImage {
    GrayImage {
        width: luma.width() as usize,
        height: luma.height() as usize,
        data: luma.into_raw(),
    }
}

/// A scan on disk, decoded each time it is loaded.
#[derive(Clone, Debug)]
pub struct ImageFileSource {
    pub path: PathBuf,
    pub px_per_mm: f64,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>, dpi: f64) -> Self {
        Self {
            path: path.into(),
            px_per_mm: dpi / 25.4,
        }
    }
}

impl SurfaceSource for ImageFileSource {
    fn load(&self, rotated: bool) -> Result<PageSurface, SurfaceError> {
        let image = load_gray_image(&self.path).map_err(|err| match err {
            ScanError::Io(io) => SurfaceError::Io(io),
            other => SurfaceError::Decode {
                path: self.path.display().to_string(),
                reason: other.to_string(),
            },
        })?;
        let image = if rotated { image.rotated_180() } else { image };
        Ok(PageSurface::new(image, self.px_per_mm))
    }
}

fn default_dpi() -> f64 {
    300.0
}

/// Configuration of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(flatten)]
    pub survey: SurveyDefinition,
    #[serde(default)]
    pub raster: RasterParams,
    /// Resolution the sheets were scanned at.
    #[serde(default = "default_dpi")]
    pub dpi: f64,
    /// Image files per sheet, in scan order.
    pub sheets: Vec<Vec<String>>,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl ScanConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ScanError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("sheetscan_report.json"))
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        self.survey.layout.validate()?;
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(ScanError::InvalidDpi(self.dpi));
        }
        if let Some(index) = self.sheets.iter().position(|s| s.is_empty()) {
            return Err(ScanError::EmptySheet { index });
        }
        Ok(())
    }

    /// Build the sheets, resolving relative image paths against `base_dir`.
    pub fn build_sheets(&self, base_dir: &Path) -> Vec<Sheet> {
        self.sheets
            .iter()
            .map(|files| {
                let images = files
                    .iter()
                    .map(|file| {
                        let path = base_dir.join(file);
                        ScannedImage::new(file.clone(), 0, ImageFileSource::new(path, self.dpi))
                    })
                    .collect();
                Sheet::new(images)
            })
            .collect()
    }
}

/// Recognize every sheet of `config` and summarize the run.
///
/// Unrecognized sheets end up in the report; only an invalid config is an error.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(config), fields(sheets = config.sheets.len()))
)]
pub fn run_scan(config: &ScanConfig, base_dir: &Path) -> Result<RecognitionReport, ScanError> {
    config.validate()?;
    let geometry = RasterGeometry::new(config.raster.clone());
    let sheets = config.build_sheets(base_dir);
    log::info!(
        "recognizing {} sheets of survey {}",
        sheets.len(),
        config.survey.layout.survey_id
    );
    let run = recognize_sheets(
        &config.survey.layout,
        &config.survey.questionnaire,
        sheets,
        &geometry,
    );
    Ok(RecognitionReport::from_run(&run))
}

//! Optical mark recognition for paper survey sheets.
//!
//! This crate ties the workspace together:
//! - re-exports of the geometry primitives (`sheetscan-core`) and the
//!   recognition pipeline (`sheetscan-recognize`),
//! - (feature `image`) scan files decoded with the `image` crate and a JSON
//!   driven batch run,
//! - (feature `cli`) the `sheetscan` command-line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! use sheetscan::scan::{run_scan, ScanConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScanConfig::load_json("scan.json")?;
//! let report = run_scan(&config, std::path::Path::new("."))?;
//! for sheet in &report.sheets {
//!     println!("valid={:?} survey={:?}", sheet.valid, sheet.survey_id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `sheetscan::core`: gray images, affine transforms, [`core::GeometryPrimitives`].
//! - `sheetscan::recognize`: layout, data model, recognition pipeline, reports.
//! - `sheetscan::scan` (feature `image`): file-backed surfaces and batch runs.

pub use sheetscan_core as core;
pub use sheetscan_recognize as recognize;

pub use sheetscan_core::{GeometryPrimitives, MmRect, RasterGeometry, RasterParams};
pub use sheetscan_recognize::{
    recognize_sheets, Questionnaire, RecognitionError, RecognitionReport, RecognitionRun,
    ScannedImage, Sheet, SurveyDefinition, SurveyLayout,
};

#[cfg(feature = "image")]
pub mod scan;

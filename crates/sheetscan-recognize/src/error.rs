use crate::model::ScannedImage;
use serde::Serialize;

/// Why an image could not be trusted.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionFailure {
    #[error("matrix not recognized")]
    TransformFailed,
    #[error("page number not recognized")]
    PageNotRecognized,
    #[error("wrong survey id (expected {expected}, found {found})")]
    SurveyIdMismatch { expected: u32, found: u32 },
    #[error("surface not available: {reason}")]
    SurfaceUnavailable { reason: String },
}

/// A recognition failure together with the scan it happened on.
///
/// Aborts recognition of the owning sheet; the batch driver keeps going.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[error("{filename}, {tiff_page}: {reason}")]
pub struct RecognitionError {
    pub filename: String,
    pub tiff_page: u32,
    pub reason: RecognitionFailure,
}

impl RecognitionError {
    pub fn new(image: &ScannedImage, reason: RecognitionFailure) -> Self {
        Self {
            filename: image.filename.clone(),
            tiff_page: image.tiff_page,
            reason,
        }
    }
}

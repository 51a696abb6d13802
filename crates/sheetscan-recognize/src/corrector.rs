//! Page transform from the corner registration marks.

use crate::error::{RecognitionError, RecognitionFailure};
use crate::layout::SurveyLayout;
use crate::model::ScannedImage;
use sheetscan_core::{AffineTransform, GeometryPrimitives};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fit the page transform of `image` on its corner marks.
///
/// On success the fit is stored as `raw_matrix` and becomes the working
/// matrix. On failure the working matrix falls back to the plain
/// millimetre-to-pixel scale of the scan, so diagnostics can still draw on
/// the page, and the image must not be recognized any further.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(file = %image.filename, page = image.tiff_page))
)]
pub fn calculate_matrix(
    image: &mut ScannedImage,
    layout: &SurveyLayout,
    geometry: &dyn GeometryPrimitives,
) -> Result<AffineTransform, RecognitionError> {
    let Some(surface) = image.surface() else {
        return Err(RecognitionError::new(
            image,
            RecognitionFailure::SurfaceUnavailable {
                reason: "surface not loaded".to_string(),
            },
        ));
    };

    let (width, height) = layout.corner_mark_extent();
    let fit = geometry.best_fit_affine(
        surface,
        layout.defs.corner_mark_left,
        layout.defs.corner_mark_top,
        width,
        height,
    );
    let px_per_mm = surface.px_per_mm;

    match fit {
        Ok(matrix) => {
            image.raw_matrix = Some(matrix);
            image.matrix = matrix;
            Ok(matrix)
        }
        Err(err) => {
            log::debug!("{}, {}: {err}", image.filename, image.tiff_page);
            log::warn!(
                "{}, {}: Matrix not recognized. Cancelling recognition of that image.",
                image.filename,
                image.tiff_page
            );
            image.raw_matrix = None;
            image.matrix = AffineTransform::scale(px_per_mm);
            Err(RecognitionError::new(image, RecognitionFailure::TransformFailed))
        }
    }
}

//! Page number from the four corner boxes.

use crate::corrector::calculate_matrix;
use crate::error::{RecognitionError, RecognitionFailure};
use crate::layout::{CornerPattern, SurveyLayout};
use crate::model::ScannedImage;
use sheetscan_core::{AffineTransform, GeometryPrimitives, MmRect, PageSurface};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Half a typographic point in millimetres.
pub const HALF_PT_MM: f64 = 0.5 / 72.0 * 25.4;
/// One typographic point in millimetres.
pub const PT_MM: f64 = 1.0 / 72.0 * 25.4;

/// Result of looking a corner pattern up in the page table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageMatch {
    /// 1-based page number.
    pub page_number: u32,
    /// The pattern only matched after turning the page by 180°.
    pub rotated: bool,
}

/// Nominal corner box rectangles in TL, TR, BL, BR order.
pub fn corner_box_rects(layout: &SurveyLayout) -> [MmRect; 4] {
    let d = &layout.defs;
    let (w, h, p) = (d.corner_box_width, d.corner_box_height, d.corner_box_padding);
    let left = d.corner_mark_left + p;
    let right = layout.paper_width - d.corner_mark_right - p - w;
    let top = d.corner_mark_top + p;
    let bottom = layout.paper_height - d.corner_mark_bottom - p - h;
    [
        MmRect::new(left, top, w, h),
        MmRect::new(right, top, w, h),
        MmRect::new(left, bottom, w, h),
        MmRect::new(right, bottom, w, h),
    ]
}

/// Area sampled for a corner box.
///
/// The printed coordinates address the centre of the outline stroke, so the
/// sampled area grows by half a point on every side.
pub fn corner_box_sampling_rect(nominal: MmRect) -> MmRect {
    MmRect::new(
        nominal.x - HALF_PT_MM,
        nominal.y - HALF_PT_MM,
        nominal.width + PT_MM,
        nominal.height + PT_MM,
    )
}

/// Binarize the four corner boxes under `matrix`.
pub fn sample_corner_pattern(
    surface: &PageSurface,
    matrix: &AffineTransform,
    layout: &SurveyLayout,
    geometry: &dyn GeometryPrimitives,
) -> CornerPattern {
    let on = layout.defs.cornerbox_on_coverage;
    let bits = corner_box_rects(layout)
        .map(|r| geometry.coverage(surface, matrix, corner_box_sampling_rect(r)) > on);
    CornerPattern(bits)
}

/// Look `observed` up in `table`, trying the 180° reading only when the
/// upright reading matches nothing.
pub fn identify_page(observed: CornerPattern, table: &[CornerPattern]) -> Option<PageMatch> {
    let position = |pattern: CornerPattern| {
        table
            .iter()
            .position(|p| *p == pattern)
            .map(|i| i as u32 + 1)
    };

    if let Some(page_number) = position(observed) {
        return Some(PageMatch {
            page_number,
            rotated: false,
        });
    }
    position(observed.reversed()).map(|page_number| PageMatch {
        page_number,
        rotated: true,
    })
}

/// Resolve the page number of an image whose page transform is already fitted.
///
/// A page found upside down is reloaded rotated and its transform refitted
/// from scratch.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(file = %image.filename, page = image.tiff_page))
)]
pub fn identify_image(
    image: &mut ScannedImage,
    layout: &SurveyLayout,
    geometry: &dyn GeometryPrimitives,
) -> Result<PageMatch, RecognitionError> {
    let Some(surface) = image.surface() else {
        return Err(RecognitionError::new(
            image,
            RecognitionFailure::SurfaceUnavailable {
                reason: "surface not loaded".to_string(),
            },
        ));
    };
    let observed = sample_corner_pattern(surface, &image.matrix, layout, geometry);
    log::debug!(
        "{}, {}: corner pattern {:?}",
        image.filename,
        image.tiff_page,
        observed.0
    );

    let Some(found) = identify_page(observed, &layout.defs.corner_boxes) else {
        log::warn!(
            "{}, {}: Page number not recognized. Cancelling recognition of that image.",
            image.filename,
            image.tiff_page
        );
        return Err(RecognitionError::new(
            image,
            RecognitionFailure::PageNotRecognized,
        ));
    };

    image.page_number = Some(found.page_number);
    image.rotated = found.rotated;
    if found.rotated {
        log::info!(
            "{}, {}: page {} scanned upside down",
            image.filename,
            image.tiff_page,
            found.page_number
        );
        if let Err(err) = image.load_surface() {
            return Err(RecognitionError::new(
                image,
                RecognitionFailure::SurfaceUnavailable {
                    reason: err.to_string(),
                },
            ));
        }
        calculate_matrix(image, layout, geometry)?;
    }
    Ok(found)
}

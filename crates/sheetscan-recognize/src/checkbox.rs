//! Checkbox classification by ink coverage.

use crate::layout::RecognitionDefs;
use crate::model::BoxData;
use serde::{Deserialize, Serialize};
use sheetscan_core::{AffineTransform, GeometryPrimitives, MmRect, PageSurface, Point2, Vector2};

/// How a checkbox was marked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckboxState {
    /// Coverage at or below the checked threshold.
    Unfilled,
    /// Coverage strictly between the two thresholds.
    Filled,
    /// Coverage at or above the corrected threshold: blacked out to take the mark back.
    OverMarked,
}

impl CheckboxState {
    pub fn is_filled(self) -> bool {
        self == CheckboxState::Filled
    }
}

/// Classify a measured coverage; only the open interval between the two
/// thresholds counts as a mark.
pub fn classify_checkbox(coverage: f64, defs: &RecognitionDefs) -> CheckboxState {
    if coverage <= defs.checkbox_checked_coverage {
        CheckboxState::Unfilled
    } else if coverage < defs.checkbox_corrected_coverage {
        CheckboxState::Filled
    } else {
        CheckboxState::OverMarked
    }
}

/// Locate and measure one checkbox.
///
/// The nominal rectangle is moved by the region-local correction; the
/// corrected rectangle is reported whatever the outcome, and coverage is
/// sampled over it grown by the (signed) border width. With the stock
/// inset only pen marks inside the printed outline are counted.
pub fn measure_checkbox(
    surface: &PageSurface,
    matrix: &AffineTransform,
    geometry: &dyn GeometryPrimitives,
    defs: &RecognitionDefs,
    nominal: MmRect,
) -> (BoxData, CheckboxState) {
    let correction = geometry.local_affine_correction(surface, matrix, nominal);
    let origin = correction.apply(Point2::new(nominal.x, nominal.y));
    let extent = correction.apply_distance(Vector2::new(nominal.width, nominal.height));
    let corrected = MmRect::new(origin.x, origin.y, extent.x, extent.y);

    let coverage = geometry.coverage(
        surface,
        matrix,
        corrected.expanded(defs.checkbox_border_width),
    );
    let state = classify_checkbox(coverage, defs);
    (
        BoxData::with_rect(corrected, coverage, state.is_filled()),
        state,
    )
}

//! Binary ID codes printed as rows of marker cells.

use crate::error::{RecognitionError, RecognitionFailure};
use crate::layout::{RecognitionDefs, SurveyLayout};
use crate::model::{ScannedImage, SheetIds};
use crate::warnings::{Warning, WarningCollector};
use sheetscan_core::{AffineTransform, GeometryPrimitives, MmRect, PageSurface};

/// Sampled interior of each cell of a code row starting at `(x, y)`, left to right.
pub fn codebox_cells(defs: &RecognitionDefs, x: f64, y: f64) -> impl Iterator<Item = MmRect> + '_ {
    (0..defs.codebox_length).map(move |i| {
        MmRect::new(
            x + i as f64 * defs.codebox_step + defs.codebox_offset,
            y + defs.codebox_offset,
            defs.codebox_step - 2.0 * defs.codebox_offset,
            defs.codebox_height - 2.0 * defs.codebox_offset,
        )
    })
}

/// Decode one code row, shifting its bits into `code` most significant first.
pub fn read_codebox(
    surface: &PageSurface,
    matrix: &AffineTransform,
    geometry: &dyn GeometryPrimitives,
    defs: &RecognitionDefs,
    x: f64,
    y: f64,
    code: u32,
) -> u32 {
    codebox_cells(defs, x, y).fold(code, |acc, cell| {
        let on = geometry.coverage(surface, matrix, cell) > defs.codebox_on_coverage;
        (acc << 1) | u32::from(on)
    })
}

/// Read the survey and questionnaire IDs printed on `image` into `ids`.
///
/// Only call this for pages that carry codes. A survey ID other than the
/// layout's fails the image; a questionnaire ID differing from the one
/// already recorded on the sheet is only worth a warning.
pub fn read_sheet_ids(
    image: &ScannedImage,
    ids: &mut SheetIds,
    layout: &SurveyLayout,
    geometry: &dyn GeometryPrimitives,
    warnings: &mut WarningCollector,
) -> Result<(), RecognitionError> {
    let Some(surface) = image.surface() else {
        return Err(RecognitionError::new(
            image,
            RecognitionFailure::SurfaceUnavailable {
                reason: "surface not loaded".to_string(),
            },
        ));
    };
    let defs = &layout.defs;
    let read = |x: f64, y: f64, code: u32| {
        read_codebox(surface, &image.matrix, geometry, defs, x, y, code)
    };

    if layout.print_survey_id {
        let pos = layout.survey_id_pos;
        let survey_id = read(pos.second_x, pos.y, read(pos.first_x, pos.y, 0));
        ids.survey_id = Some(survey_id);
        if survey_id != layout.survey_id {
            log::warn!(
                "{}, {}: Wrong survey_id. Cancelling recognition of that image.",
                image.filename,
                image.tiff_page
            );
            return Err(RecognitionError::new(
                image,
                RecognitionFailure::SurveyIdMismatch {
                    expected: layout.survey_id,
                    found: survey_id,
                },
            ));
        }
    } else {
        ids.survey_id = Some(layout.survey_id);
    }

    if layout.print_questionnaire_id {
        let pos = layout.questionnaire_id_pos;
        let questionnaire_id = read(pos.x, pos.y, 0);
        if ids
            .questionnaire_id
            .is_some_and(|previous| previous != questionnaire_id)
        {
            warnings.warn_once(Warning::MultipageOrder);
        }
        ids.questionnaire_id = Some(questionnaire_id);
    } else {
        ids.questionnaire_id = None;
    }
    Ok(())
}

use super::{RecognitionContext, Recognize, SheetScope};
use crate::error::RecognitionError;
use crate::layout::SurveyLayout;
use crate::model::{Questionnaire, Sheet};
use crate::warnings::Warning;
use sheetscan_core::GeometryPrimitives;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// One recognized sheet with its own copy of the answer tree.
#[derive(Debug)]
pub struct SheetOutcome {
    pub sheet: Sheet,
    /// Left untouched when the sheet was not recognized.
    pub answers: Questionnaire,
}

impl SheetOutcome {
    pub fn error(&self) -> Option<&RecognitionError> {
        self.sheet.failure.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.sheet.valid == Some(true)
    }
}

/// Result of recognizing a batch of sheets.
#[derive(Debug, Default)]
pub struct RecognitionRun {
    pub outcomes: Vec<SheetOutcome>,
    pub warnings: Vec<Warning>,
}

impl RecognitionRun {
    pub fn valid_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_valid()).count()
    }
}

/// Recognize `sheets` one after another against a fresh copy of `questionnaire`.
///
/// A sheet that fails is reported in its outcome and never stops the batch.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(sheets = sheets.len()))
)]
pub fn recognize_sheets(
    layout: &SurveyLayout,
    questionnaire: &Questionnaire,
    sheets: Vec<Sheet>,
    geometry: &dyn GeometryPrimitives,
) -> RecognitionRun {
    let mut ctx = RecognitionContext::new(layout, geometry);
    let mut outcomes = Vec::with_capacity(sheets.len());

    for (index, mut sheet) in sheets.into_iter().enumerate() {
        let mut answers = questionnaire.clone();
        let mut scope = SheetScope {
            ctx: &mut ctx,
            sheet: &mut sheet,
        };
        // failures are recorded on the sheet, the questionnaire never returns one
        if let Err(err) = answers.recognize(&mut scope) {
            log::error!("sheet {index}: {err}");
        }
        log::debug!(
            "sheet {index}: valid={:?} pages={:?}",
            sheet.valid,
            sheet.page_order()
        );
        outcomes.push(SheetOutcome { sheet, answers });
    }

    let run = RecognitionRun {
        outcomes,
        warnings: ctx.warnings.take(),
    };
    log::info!(
        "recognized {} of {} sheets",
        run.valid_count(),
        run.outcomes.len()
    );
    run
}

//! Top-down recognition: sheet, images, questionnaire tree, boxes.
//!
//! Every entity recognizes itself through [`Recognize`], parameterized by
//! the scope it needs from its parent. Image-level failures abort the sheet
//! and are absorbed at the questionnaire, which then leaves its answers
//! untouched.

mod batch;

pub use batch::{recognize_sheets, RecognitionRun, SheetOutcome};

use crate::checkbox::measure_checkbox;
use crate::codebox::read_sheet_ids;
use crate::corrector::calculate_matrix;
use crate::error::{RecognitionError, RecognitionFailure};
use crate::layout::SurveyLayout;
use crate::model::{
    AnswerBox, BoxGeometry, Checkbox, QObject, Question, Questionnaire, ScannedImage, Sheet,
    SheetIds, Textbox,
};
use crate::page_id::identify_image;
use crate::textbox::measure_textbox;
use crate::warnings::WarningCollector;
use sheetscan_core::{GeometryPrimitives, PageSurface};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Recognition behaviour of one entity kind.
pub trait Recognize<Scope: ?Sized> {
    fn recognize(&mut self, scope: &mut Scope) -> Result<(), RecognitionError>;

    /// Drop transient resources held after recognition.
    fn clean(&mut self) {}
}

/// State shared by a whole recognition run.
pub struct RecognitionContext<'a> {
    pub layout: &'a SurveyLayout,
    pub geometry: &'a dyn GeometryPrimitives,
    pub warnings: WarningCollector,
}

impl<'a> RecognitionContext<'a> {
    pub fn new(layout: &'a SurveyLayout, geometry: &'a dyn GeometryPrimitives) -> Self {
        Self {
            layout,
            geometry,
            warnings: WarningCollector::new(),
        }
    }
}

/// What an image needs from its sheet.
pub struct ImageScope<'s, 'a> {
    pub ctx: &'s mut RecognitionContext<'a>,
    pub ids: &'s mut SheetIds,
}

/// A questionnaire is recognized against one sheet.
pub struct SheetScope<'s, 'a> {
    pub ctx: &'s mut RecognitionContext<'a>,
    pub sheet: &'s mut Sheet,
}

/// Read-only view boxes are recognized in.
pub struct BoxScope<'s> {
    pub layout: &'s SurveyLayout,
    pub geometry: &'s dyn GeometryPrimitives,
    pub sheet: &'s Sheet,
}

impl BoxScope<'_> {
    /// Surface and page transform of the image holding `geometry`.
    fn page(&self, geometry: &BoxGeometry) -> Option<(&PageSurface, &ScannedImage)> {
        let image = self.sheet.image_for_page(geometry.page_number)?;
        Some((image.surface()?, image))
    }
}

/// Cleans a sheet, releasing its surfaces, when dropped.
pub struct SurfaceGuard<'s> {
    sheet: &'s mut Sheet,
}

impl<'s> SurfaceGuard<'s> {
    pub fn new(sheet: &'s mut Sheet) -> Self {
        Self { sheet }
    }

    pub fn get(&self) -> &Sheet {
        self.sheet
    }

    pub fn get_mut(&mut self) -> &mut Sheet {
        self.sheet
    }
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        <Sheet as Recognize<RecognitionContext<'_>>>::clean(self.sheet);
    }
}

impl<'a> Recognize<RecognitionContext<'a>> for Sheet {
    /// Recognize the images in order, stopping at the first failure.
    ///
    /// On success the images are sorted by page number.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(images = self.images.len()))
    )]
    fn recognize(&mut self, ctx: &mut RecognitionContext<'a>) -> Result<(), RecognitionError> {
        self.valid = Some(true);
        self.failure = None;
        for image in self.images.iter_mut() {
            let mut scope = ImageScope {
                ctx: &mut *ctx,
                ids: &mut self.ids,
            };
            if let Err(err) = image.recognize(&mut scope) {
                self.valid = Some(false);
                self.failure = Some(err.clone());
                return Err(err);
            }
        }
        self.images.sort_by_key(|image| image.page_number);
        Ok(())
    }

    fn clean(&mut self) {
        for image in &mut self.images {
            <ScannedImage as Recognize<ImageScope<'_, '_>>>::clean(image);
        }
    }
}

impl ScannedImage {
    fn recognize_steps(
        &mut self,
        ctx: &mut RecognitionContext<'_>,
        ids: &mut SheetIds,
    ) -> Result<(), RecognitionError> {
        if let Err(err) = self.load_surface() {
            return Err(RecognitionError::new(
                self,
                RecognitionFailure::SurfaceUnavailable {
                    reason: err.to_string(),
                },
            ));
        }
        calculate_matrix(self, ctx.layout, ctx.geometry)?;
        let page = identify_image(self, ctx.layout, ctx.geometry)?;
        if ctx.layout.page_carries_codes(page.page_number) {
            read_sheet_ids(self, ids, ctx.layout, ctx.geometry, &mut ctx.warnings)?;
        }
        Ok(())
    }
}

impl Recognize<ImageScope<'_, '_>> for ScannedImage {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(file = %self.filename, page = self.tiff_page))
    )]
    fn recognize(&mut self, scope: &mut ImageScope<'_, '_>) -> Result<(), RecognitionError> {
        self.rotated = false;
        self.page_number = None;
        self.recognition_failed = false;
        let result = self.recognize_steps(&mut *scope.ctx, &mut *scope.ids);
        if result.is_err() {
            self.recognition_failed = true;
        }
        result
    }

    fn clean(&mut self) {
        self.release_surface();
    }
}

impl Recognize<SheetScope<'_, '_>> for Questionnaire {
    /// Recognize the sheet, then the answers if the sheet was recognized.
    ///
    /// A failed sheet is not an error here; surfaces are released either way.
    fn recognize(&mut self, scope: &mut SheetScope<'_, '_>) -> Result<(), RecognitionError> {
        let mut sheet = SurfaceGuard::new(&mut *scope.sheet);
        if let Err(err) = sheet.get_mut().recognize(&mut *scope.ctx) {
            log::info!("{err}; answers of this sheet stay unrecognized");
            return Ok(());
        }

        let mut boxes = BoxScope {
            layout: scope.ctx.layout,
            geometry: scope.ctx.geometry,
            sheet: sheet.get(),
        };
        for qobject in &mut self.qobjects {
            qobject.recognize(&mut boxes)?;
        }
        Ok(())
    }
}

impl Recognize<BoxScope<'_>> for QObject {
    fn recognize(&mut self, scope: &mut BoxScope<'_>) -> Result<(), RecognitionError> {
        match self {
            QObject::Heading { .. } => Ok(()),
            QObject::Question(question) => question.recognize(scope),
        }
    }
}

impl Recognize<BoxScope<'_>> for Question {
    fn recognize(&mut self, scope: &mut BoxScope<'_>) -> Result<(), RecognitionError> {
        for answer in &mut self.boxes {
            answer.recognize(scope)?;
        }
        Ok(())
    }
}

impl Recognize<BoxScope<'_>> for AnswerBox {
    fn recognize(&mut self, scope: &mut BoxScope<'_>) -> Result<(), RecognitionError> {
        match self {
            AnswerBox::Checkbox(b) => b.recognize(scope),
            AnswerBox::Textbox(b) => b.recognize(scope),
        }
    }
}

impl Recognize<BoxScope<'_>> for Checkbox {
    fn recognize(&mut self, scope: &mut BoxScope<'_>) -> Result<(), RecognitionError> {
        let Some((surface, image)) = scope.page(&self.geometry) else {
            log::debug!("no image for page {}", self.geometry.page_number);
            return Ok(());
        };
        let (data, state) = measure_checkbox(
            surface,
            &image.matrix,
            scope.geometry,
            &scope.layout.defs,
            self.geometry.rect,
        );
        self.data = data;
        self.classification = Some(state);
        Ok(())
    }
}

impl Recognize<BoxScope<'_>> for Textbox {
    fn recognize(&mut self, scope: &mut BoxScope<'_>) -> Result<(), RecognitionError> {
        let Some((surface, image)) = scope.page(&self.geometry) else {
            log::debug!("no image for page {}", self.geometry.page_number);
            return Ok(());
        };
        self.data = measure_textbox(
            surface,
            &image.matrix,
            scope.geometry,
            &scope.layout.defs,
            self.geometry.rect,
        );
        Ok(())
    }
}

//! Recognition of scanned survey sheets.
//!
//! Given the pages of a filled-in questionnaire and the layout it was
//! printed with, the pipeline:
//! - fits the page transform on the corner marks,
//! - identifies each page (and upside-down scans) from the corner boxes,
//! - reads the binary survey and questionnaire IDs,
//! - classifies checkboxes and detects handwriting in textboxes.
//!
//! Pixel access goes through [`sheetscan_core::GeometryPrimitives`].
//! [`recognize_sheets`] is the batch entry point; single sheets can be
//! driven through [`Recognize`] directly.

mod checkbox;
mod codebox;
mod corrector;
mod error;
mod io;
mod layout;
mod model;
mod page_id;
mod pipeline;
mod textbox;
mod warnings;

pub use checkbox::{classify_checkbox, measure_checkbox, CheckboxState};
pub use codebox::{codebox_cells, read_codebox, read_sheet_ids};
pub use corrector::calculate_matrix;
pub use error::{RecognitionError, RecognitionFailure};
pub use io::{
    BoxKind, BoxReport, ConfigIoError, ImageReport, RecognitionReport, SheetReport,
    SurveyDefinition,
};
pub use layout::{
    CodePosition, CornerPattern, LayoutError, RecognitionDefs, SurveyIdPosition, SurveyLayout,
};
pub use model::{
    AnswerBox, BoxData, BoxGeometry, Checkbox, MemorySurface, QObject, Question, Questionnaire,
    ScannedImage, Sheet, SheetIds, SurfaceError, SurfaceSource, Textbox,
};
pub use page_id::{
    corner_box_rects, corner_box_sampling_rect, identify_image, identify_page,
    sample_corner_pattern, PageMatch, HALF_PT_MM, PT_MM,
};
pub use pipeline::{
    recognize_sheets, BoxScope, ImageScope, RecognitionContext, RecognitionRun, Recognize,
    SheetOutcome, SheetScope, SurfaceGuard,
};
pub use textbox::{
    measure_textbox, refine_corners, BoundingBoxGrid, EdgeWalk, InkBounds, Outline,
    Quadrilateral, ScanParams,
};
pub use warnings::{Warning, WarningCollector};

pub use sheetscan_core as core;

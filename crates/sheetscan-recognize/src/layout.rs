//! Survey layout and recognition constants.
//!
//! Everything the recognizer needs to know about the printed form lives
//! here: paper size, registration geometry, where the ID codes are printed
//! and which corner-box pattern belongs to which page. All values are in
//! page millimetres unless stated otherwise.

use serde::{Deserialize, Serialize};

/// Filled/empty state of the four corner boxes, in TL, TR, BL, BR order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CornerPattern(pub [bool; 4]);

impl CornerPattern {
    pub const fn new(tl: bool, tr: bool, bl: bool, br: bool) -> Self {
        Self([tl, tr, bl, br])
    }

    /// The pattern as it reads on a page turned by 180°.
    pub fn reversed(self) -> Self {
        let [tl, tr, bl, br] = self.0;
        Self([br, bl, tr, tl])
    }

    /// Self-symmetric patterns read the same in both orientations.
    pub fn is_symmetric(self) -> bool {
        self == self.reversed()
    }
}

fn default_corner_boxes() -> Vec<CornerPattern> {
    vec![
        CornerPattern::new(true, false, false, false),
        CornerPattern::new(true, true, false, false),
        CornerPattern::new(true, false, true, false),
        CornerPattern::new(true, true, true, false),
        CornerPattern::new(false, true, false, false),
        CornerPattern::new(true, true, false, true),
    ]
}

/// Recognition constants shared by every survey printed with the same template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionDefs {
    /// Corner-mark rectangle, as distances from the paper edges.
    pub corner_mark_left: f64,
    pub corner_mark_right: f64,
    pub corner_mark_top: f64,
    pub corner_mark_bottom: f64,

    /// Page-number boxes next to each corner mark.
    pub corner_box_width: f64,
    pub corner_box_height: f64,
    pub corner_box_padding: f64,
    pub cornerbox_on_coverage: f64,
    /// Corner-box pattern per page, index = page number - 1.
    pub corner_boxes: Vec<CornerPattern>,

    /// Binary ID codes: `codebox_length` cells of `codebox_step` each.
    pub codebox_length: u32,
    pub codebox_step: f64,
    pub codebox_height: f64,
    pub codebox_offset: f64,
    pub codebox_on_coverage: f64,

    /// Signed margin added around the located checkbox before sampling.
    ///
    /// The located rectangle runs along the centre of the printed outline,
    /// so a negative margin keeps the outline itself out of the sample.
    pub checkbox_border_width: f64,
    pub checkbox_checked_coverage: f64,
    pub checkbox_corrected_coverage: f64,

    pub textbox_scan_step_x: f64,
    pub textbox_scan_step_y: f64,
    pub textbox_scan_width: f64,
    pub textbox_scan_height: f64,
    pub textbox_scan_coverage: f64,
    /// Padding used once the box outline has been located.
    pub textbox_scan_padding: f64,
    /// Padding used when scanning the nominal rectangle.
    pub textbox_scan_uncorrected_padding: f64,
    pub textbox_extra_padding: f64,
    pub textbox_minimum_writing_width: f64,
    pub textbox_minimum_writing_height: f64,

    /// Largest accepted deviation of a found box corner from its nominal position.
    pub find_box_corners_tolerance: f64,
}

impl Default for RecognitionDefs {
    fn default() -> Self {
        Self {
            corner_mark_left: 10.0,
            corner_mark_right: 10.0,
            corner_mark_top: 12.0,
            corner_mark_bottom: 12.0,

            corner_box_width: 3.5,
            corner_box_height: 3.5,
            corner_box_padding: 5.0,
            cornerbox_on_coverage: 0.5,
            corner_boxes: default_corner_boxes(),

            codebox_length: 16,
            codebox_step: 3.5,
            codebox_height: 3.5,
            codebox_offset: 0.5,
            codebox_on_coverage: 0.5,

            checkbox_border_width: -0.6,
            checkbox_checked_coverage: 0.08,
            checkbox_corrected_coverage: 0.75,

            textbox_scan_step_x: 1.5,
            textbox_scan_step_y: 1.5,
            textbox_scan_width: 2.0,
            textbox_scan_height: 2.0,
            textbox_scan_coverage: 0.1,
            textbox_scan_padding: 0.6,
            textbox_scan_uncorrected_padding: 1.5,
            textbox_extra_padding: 1.0,
            textbox_minimum_writing_width: 4.0,
            textbox_minimum_writing_height: 4.0,

            find_box_corners_tolerance: 2.0,
        }
    }
}

/// Left edges of the two survey-ID digit groups and their common top edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyIdPosition {
    pub first_x: f64,
    pub second_x: f64,
    pub y: f64,
}

/// Top-left corner of a single code row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodePosition {
    pub x: f64,
    pub y: f64,
}

/// Layout validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("paper ({width} x {height} mm) does not leave room inside the corner marks")]
    PaperTooSmall { width: f64, height: f64 },
    #[error("page_count must be >= 1")]
    NoPages,
    #[error("survey has {page_count} pages, corner pattern table has {available}")]
    MissingCornerPatterns { page_count: u32, available: usize },
    #[error("pages {first} and {second} share the same corner pattern")]
    DuplicateCornerPattern { first: u32, second: u32 },
    #[error("page {page} is indistinguishable from page {other} turned upside down")]
    AmbiguousOrientation { page: u32, other: u32 },
    #[error("survey id needs {bits} code bits, at most 32 fit")]
    CodeTooWide { bits: u32 },
    #[error("checkbox thresholds out of order ({checked} >= {corrected})")]
    CheckboxThresholds { checked: f64, corrected: f64 },
    #[error("textbox scan steps must be > 0")]
    InvalidScanStep,
}

/// Physical layout of one survey.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyLayout {
    /// Expected survey ID; sheets carrying another ID are rejected.
    pub survey_id: u32,
    pub paper_width: f64,
    pub paper_height: f64,
    /// Pages of one questionnaire.
    pub page_count: u32,
    #[serde(default = "default_true")]
    pub print_survey_id: bool,
    #[serde(default = "default_true")]
    pub print_questionnaire_id: bool,
    pub survey_id_pos: SurveyIdPosition,
    pub questionnaire_id_pos: CodePosition,
    #[serde(default)]
    pub defs: RecognitionDefs,
}

fn default_true() -> bool {
    true
}

impl SurveyLayout {
    /// Layout with the stock definitions and the ID codes printed in rows
    /// above the bottom corner boxes.
    pub fn new(survey_id: u32, paper_width: f64, paper_height: f64, page_count: u32) -> Self {
        let defs = RecognitionDefs::default();
        let code_width = defs.codebox_length as f64 * defs.codebox_step;
        let first_x = defs.corner_mark_left + 12.0;
        let survey_y = paper_height
            - defs.corner_mark_bottom
            - defs.corner_box_padding
            - defs.corner_box_height
            - 2.0
            - defs.codebox_height;
        let questionnaire_y = survey_y - defs.codebox_height - 2.0;

        Self {
            survey_id,
            paper_width,
            paper_height,
            page_count,
            print_survey_id: true,
            print_questionnaire_id: true,
            survey_id_pos: SurveyIdPosition {
                first_x,
                second_x: first_x + code_width + 4.0,
                y: survey_y,
            },
            questionnaire_id_pos: CodePosition {
                x: first_x,
                y: questionnaire_y,
            },
            defs,
        }
    }

    /// A4 portrait.
    pub fn a4(survey_id: u32, page_count: u32) -> Self {
        Self::new(survey_id, 210.0, 297.0, page_count)
    }

    /// Width and height of the corner-mark rectangle.
    pub fn corner_mark_extent(&self) -> (f64, f64) {
        let d = &self.defs;
        (
            self.paper_width - d.corner_mark_left - d.corner_mark_right,
            self.paper_height - d.corner_mark_top - d.corner_mark_bottom,
        )
    }

    /// Whether ID codes are printed on `page_number`.
    ///
    /// Codes sit on even pages, or on the only page of a single-page questionnaire.
    pub fn page_carries_codes(&self, page_number: u32) -> bool {
        page_number % 2 == 0 || self.page_count == 1
    }

    /// Check the layout for configurations that cannot be recognized reliably.
    pub fn validate(&self) -> Result<(), LayoutError> {
        let d = &self.defs;
        let (w, h) = self.corner_mark_extent();
        if w <= 0.0 || h <= 0.0 {
            return Err(LayoutError::PaperTooSmall {
                width: self.paper_width,
                height: self.paper_height,
            });
        }
        if self.page_count == 0 {
            return Err(LayoutError::NoPages);
        }
        if d.corner_boxes.len() < self.page_count as usize {
            return Err(LayoutError::MissingCornerPatterns {
                page_count: self.page_count,
                available: d.corner_boxes.len(),
            });
        }

        for (i, a) in d.corner_boxes.iter().enumerate() {
            for (j, b) in d.corner_boxes.iter().enumerate() {
                let (page, other) = (i as u32 + 1, j as u32 + 1);
                if i < j && a == b {
                    return Err(LayoutError::DuplicateCornerPattern {
                        first: page,
                        second: other,
                    });
                }
                if a.reversed() == *b {
                    return Err(LayoutError::AmbiguousOrientation { page, other });
                }
            }
        }

        let bits = 2 * d.codebox_length;
        if bits > 32 {
            return Err(LayoutError::CodeTooWide { bits });
        }
        if d.checkbox_checked_coverage >= d.checkbox_corrected_coverage {
            return Err(LayoutError::CheckboxThresholds {
                checked: d.checkbox_checked_coverage,
                corrected: d.checkbox_corrected_coverage,
            });
        }
        if d.textbox_scan_step_x <= 0.0 || d.textbox_scan_step_y <= 0.0 {
            return Err(LayoutError::InvalidScanStep);
        }
        Ok(())
    }
}

//! JSON survey definitions and recognition reports.

use crate::checkbox::CheckboxState;
use crate::error::RecognitionError;
use crate::layout::{LayoutError, SurveyLayout};
use crate::model::{AnswerBox, BoxData, Questionnaire, ScannedImage};
use crate::pipeline::{RecognitionRun, SheetOutcome};
use crate::warnings::Warning;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Printed layout plus the questionnaire tree it carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyDefinition {
    pub layout: SurveyLayout,
    #[serde(default)]
    pub questionnaire: Questionnaire,
}

impl SurveyDefinition {
    /// Load a definition from disk and validate its layout.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        let def: Self = serde_json::from_str(&raw)?;
        def.layout.validate()?;
        Ok(def)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub filename: String,
    pub tiff_page: u32,
    pub page_number: Option<u32>,
    pub rotated: bool,
    pub recognition_failed: bool,
    /// Fitted page transform as `(xx, yx, xy, yy, x0, y0)`.
    pub matrix: Option<[f64; 6]>,
}

impl From<&ScannedImage> for ImageReport {
    fn from(image: &ScannedImage) -> Self {
        Self {
            filename: image.filename.clone(),
            tiff_page: image.tiff_page,
            page_number: image.page_number,
            rotated: image.rotated,
            recognition_failed: image.recognition_failed,
            matrix: image.raw_matrix.map(|m| m.coefficients()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxKind {
    Checkbox,
    Textbox,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxReport {
    pub question: String,
    pub label: String,
    pub kind: BoxKind,
    pub page_number: u32,
    pub data: BoxData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkbox: Option<CheckboxState>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SheetReport {
    pub valid: Option<bool>,
    pub survey_id: Option<u32>,
    pub questionnaire_id: Option<u32>,
    pub images: Vec<ImageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RecognitionError>,
    pub boxes: Vec<BoxReport>,
}

impl From<&SheetOutcome> for SheetReport {
    fn from(outcome: &SheetOutcome) -> Self {
        let sheet = &outcome.sheet;
        let boxes = outcome
            .answers
            .boxes()
            .map(|(question, answer)| {
                let (kind, checkbox) = match answer {
                    AnswerBox::Checkbox(b) => (BoxKind::Checkbox, b.classification),
                    AnswerBox::Textbox(_) => (BoxKind::Textbox, None),
                };
                BoxReport {
                    question: question.id.clone(),
                    label: answer.label().to_string(),
                    kind,
                    page_number: answer.geometry().page_number,
                    data: *answer.data(),
                    checkbox,
                }
            })
            .collect();

        Self {
            valid: sheet.valid,
            survey_id: sheet.ids.survey_id,
            questionnaire_id: sheet.ids.questionnaire_id,
            images: sheet.images.iter().map(ImageReport::from).collect(),
            failure: sheet.failure.clone(),
            boxes,
        }
    }
}

/// JSON summary of a recognition run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecognitionReport {
    pub sheets: Vec<SheetReport>,
    pub warnings: Vec<Warning>,
}

impl RecognitionReport {
    pub fn from_run(run: &RecognitionRun) -> Self {
        Self {
            sheets: run.outcomes.iter().map(SheetReport::from).collect(),
            warnings: run.warnings.clone(),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checkbox, QObject, Question, Textbox};
    use sheetscan_core::MmRect;

    fn definition() -> SurveyDefinition {
        SurveyDefinition {
            layout: SurveyLayout::a4(42, 2),
            questionnaire: Questionnaire {
                title: "Course feedback".to_string(),
                qobjects: vec![
                    QObject::Heading {
                        title: "General".to_string(),
                    },
                    QObject::Question(Question {
                        id: "1".to_string(),
                        title: "Was it useful?".to_string(),
                        boxes: vec![
                            AnswerBox::Checkbox(Checkbox::new(
                                "yes",
                                1,
                                MmRect::new(40.0, 60.0, 3.5, 3.5),
                            )),
                            AnswerBox::Textbox(Textbox::new(
                                "why",
                                2,
                                MmRect::new(30.0, 40.0, 150.0, 40.0),
                            )),
                        ],
                    }),
                ],
            },
        }
    }

    #[test]
    fn definition_survives_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("survey.json");
        let def = definition();
        def.write_json(&path).expect("write");
        let back = SurveyDefinition::load_json(&path).expect("load");
        assert_eq!(back, def);
    }

    #[test]
    fn invalid_layout_is_rejected_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("survey.json");
        let mut def = definition();
        def.layout.page_count = 0;
        def.write_json(&path).expect("write");
        assert!(matches!(
            SurveyDefinition::load_json(&path),
            Err(ConfigIoError::Layout(LayoutError::NoPages))
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("survey.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            SurveyDefinition::load_json(&path),
            Err(ConfigIoError::Json(_))
        ));
    }
}

//! Sheets, scanned images and the questionnaire tree recognition writes into.

use crate::checkbox::CheckboxState;
use crate::error::RecognitionError;
use serde::{Deserialize, Serialize};
use sheetscan_core::{AffineTransform, GrayImage, MmRect, PageSurface};
use std::fmt;

/// Failure to turn a scan into an addressable pixel surface.
#[derive(thiserror::Error, Debug)]
pub enum SurfaceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("cannot decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("page {page} not present in {path}")]
    MissingPage { path: String, page: u32 },
}

/// Something that can produce the pixels of one scanned page on demand.
///
/// Surfaces are loaded when an image is recognized and released right after
/// its sheet is done, so implementations should hold the encoded data (or a
/// path) rather than a decoded raster.
pub trait SurfaceSource: fmt::Debug {
    /// Decode the page; `rotated` asks for it turned by 180°.
    fn load(&self, rotated: bool) -> Result<PageSurface, SurfaceError>;
}

/// A page already held in memory.
#[derive(Clone, Debug)]
pub struct MemorySurface {
    pub image: GrayImage,
    pub px_per_mm: f64,
}

impl MemorySurface {
    pub fn new(image: GrayImage, px_per_mm: f64) -> Self {
        Self { image, px_per_mm }
    }
}

impl SurfaceSource for MemorySurface {
    fn load(&self, rotated: bool) -> Result<PageSurface, SurfaceError> {
        let image = if rotated {
            self.image.rotated_180()
        } else {
            self.image.clone()
        };
        Ok(PageSurface::new(image, self.px_per_mm))
    }
}

/// One physical scanned page.
#[derive(Debug)]
pub struct ScannedImage {
    pub filename: String,
    /// Page index inside a multi-page scan file.
    pub tiff_page: u32,
    source: Box<dyn SurfaceSource>,
    surface: Option<PageSurface>,
    /// Page transform fitted on the corner marks, if the fit succeeded.
    pub raw_matrix: Option<AffineTransform>,
    /// Working mm → px transform; the plain scale fallback after a failed fit.
    pub matrix: AffineTransform,
    /// Scanned upside down relative to the printed page.
    pub rotated: bool,
    pub page_number: Option<u32>,
    pub recognition_failed: bool,
}

impl ScannedImage {
    pub fn new(
        filename: impl Into<String>,
        tiff_page: u32,
        source: impl SurfaceSource + 'static,
    ) -> Self {
        Self {
            filename: filename.into(),
            tiff_page,
            source: Box::new(source),
            surface: None,
            raw_matrix: None,
            matrix: AffineTransform::identity(),
            rotated: false,
            page_number: None,
            recognition_failed: false,
        }
    }

    /// Decode the surface in the current orientation, replacing any loaded one.
    pub fn load_surface(&mut self) -> Result<&PageSurface, SurfaceError> {
        let surface = self.source.load(self.rotated)?;
        Ok(self.surface.insert(surface))
    }

    pub fn surface(&self) -> Option<&PageSurface> {
        self.surface.as_ref()
    }

    pub fn release_surface(&mut self) {
        self.surface = None;
    }

    /// The fitted page transform, or the working fallback when fitting failed.
    pub fn mm_to_px(&self) -> AffineTransform {
        self.raw_matrix.unwrap_or(self.matrix)
    }
}

/// Identifiers decoded from the printed codes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetIds {
    pub survey_id: Option<u32>,
    /// `None` when the layout prints no questionnaire ID.
    pub questionnaire_id: Option<u32>,
}

/// One scan unit: the pages of a single filled-in questionnaire.
#[derive(Debug, Default)]
pub struct Sheet {
    /// `None` until recognized, then whether every image was recognized.
    pub valid: Option<bool>,
    pub ids: SheetIds,
    pub images: Vec<ScannedImage>,
    /// Why recognition was abandoned, when it was.
    pub failure: Option<RecognitionError>,
}

impl Sheet {
    pub fn new(images: Vec<ScannedImage>) -> Self {
        Self {
            images,
            ..Self::default()
        }
    }

    /// The recognized image carrying `page_number`.
    pub fn image_for_page(&self, page_number: u32) -> Option<&ScannedImage> {
        self.images
            .iter()
            .find(|img| img.page_number == Some(page_number) && !img.recognition_failed)
    }

    /// Page numbers in the current image order.
    pub fn page_order(&self) -> Vec<Option<u32>> {
        self.images.iter().map(|img| img.page_number).collect()
    }
}

/// Where a box was printed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub page_number: u32,
    #[serde(flatten)]
    pub rect: MmRect,
}

/// What recognition found for a box.
///
/// The rectangle is in corrected page millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxData {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub coverage: f64,
    pub state: bool,
}

impl BoxData {
    pub fn with_rect(rect: MmRect, coverage: f64, state: bool) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            coverage,
            state,
        }
    }

    pub fn rect(&self) -> MmRect {
        MmRect::new(self.x, self.y, self.width, self.height)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkbox {
    #[serde(default)]
    pub label: String,
    pub geometry: BoxGeometry,
    #[serde(default)]
    pub data: BoxData,
    #[serde(default)]
    pub classification: Option<CheckboxState>,
}

impl Checkbox {
    pub fn new(label: impl Into<String>, page_number: u32, rect: MmRect) -> Self {
        Self {
            label: label.into(),
            geometry: BoxGeometry { page_number, rect },
            data: BoxData::default(),
            classification: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Textbox {
    #[serde(default)]
    pub label: String,
    pub geometry: BoxGeometry,
    #[serde(default)]
    pub data: BoxData,
}

impl Textbox {
    pub fn new(label: impl Into<String>, page_number: u32, rect: MmRect) -> Self {
        Self {
            label: label.into(),
            geometry: BoxGeometry { page_number, rect },
            data: BoxData::default(),
        }
    }
}

/// An answer region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerBox {
    Checkbox(Checkbox),
    Textbox(Textbox),
}

impl AnswerBox {
    pub fn geometry(&self) -> &BoxGeometry {
        match self {
            AnswerBox::Checkbox(b) => &b.geometry,
            AnswerBox::Textbox(b) => &b.geometry,
        }
    }

    pub fn data(&self) -> &BoxData {
        match self {
            AnswerBox::Checkbox(b) => &b.data,
            AnswerBox::Textbox(b) => &b.data,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AnswerBox::Checkbox(b) => &b.label,
            AnswerBox::Textbox(b) => &b.label,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub boxes: Vec<AnswerBox>,
}

/// Structural node of the printed form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QObject {
    Heading { title: String },
    Question(Question),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub qobjects: Vec<QObject>,
}

impl Questionnaire {
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.qobjects.iter().filter_map(|q| match q {
            QObject::Question(question) => Some(question),
            QObject::Heading { .. } => None,
        })
    }

    pub fn boxes(&self) -> impl Iterator<Item = (&Question, &AnswerBox)> {
        self.questions()
            .flat_map(|q| q.boxes.iter().map(move |b| (q, b)))
    }
}

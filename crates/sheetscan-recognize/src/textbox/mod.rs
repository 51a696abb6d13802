//! Handwriting detection in free-text boxes.
//!
//! The box is scanned with a small test window over its interior and along
//! its outline. Windows holding enough ink are merged into one bounding box,
//! which becomes the reported geometry when it is large enough to be writing
//! rather than noise.

mod quad;

pub use quad::{BoundingBoxGrid, EdgeWalk, Outline, Quadrilateral, ScanParams};

use crate::layout::RecognitionDefs;
use crate::model::BoxData;
use sheetscan_core::{AffineTransform, GeometryPrimitives, MmRect, PageSurface, Point2};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Running union of ink windows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InkBounds {
    rect: Option<MmRect>,
}

impl InkBounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, window: MmRect) {
        self.rect = Some(match self.rect {
            None => window,
            Some(r) => {
                let x = r.x.min(window.x);
                let y = r.y.min(window.y);
                let right = (r.x + r.width).max(window.x + window.width);
                let bottom = (r.y + r.height).max(window.y + window.height);
                MmRect::new(x, y, right - x, bottom - y)
            }
        });
    }

    pub fn get(&self) -> Option<MmRect> {
        self.rect
    }
}

/// Corners of the printed box outline, if the finder put all of them within
/// `find_box_corners_tolerance` of their nominal position.
pub fn refine_corners(
    surface: &PageSurface,
    matrix: &AffineTransform,
    geometry: &dyn GeometryPrimitives,
    defs: &RecognitionDefs,
    nominal: MmRect,
) -> Option<[Point2<f64>; 4]> {
    let found = match geometry.find_quad_corners(surface, matrix, nominal) {
        Ok(found) => found,
        Err(err) => {
            log::trace!("textbox outline not found: {err}");
            return None;
        }
    };
    let tolerance = defs.find_box_corners_tolerance;
    let close = found
        .iter()
        .zip(nominal.corners())
        .all(|(f, e)| (f.x - e.x).abs() <= tolerance && (f.y - e.y).abs() <= tolerance);
    if !close {
        log::debug!("textbox corners {found:?} too far from {nominal:?}");
        return None;
    }
    Some(found)
}

/// Detect handwriting in the box printed at `nominal`.
///
/// With writing present the result is the merged ink box grown by the scan
/// and extra padding, with `state` set. Otherwise it is the nominal
/// rectangle unchanged.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(surface, matrix, geometry, defs))
)]
pub fn measure_textbox(
    surface: &PageSurface,
    matrix: &AffineTransform,
    geometry: &dyn GeometryPrimitives,
    defs: &RecognitionDefs,
    nominal: MmRect,
) -> BoxData {
    let refined = refine_corners(surface, matrix, geometry, defs, nominal)
        .and_then(|[tl, tr, br, bl]| Quadrilateral::new(tl, tr, br, bl));
    let (quad, padding) = match refined {
        Some(quad) => (Some(quad), defs.textbox_scan_padding),
        None => (
            Quadrilateral::from_rect(nominal),
            defs.textbox_scan_uncorrected_padding,
        ),
    };

    let params = ScanParams {
        step_x: defs.textbox_scan_step_x,
        step_y: defs.textbox_scan_step_y,
        window_width: defs.textbox_scan_width,
        window_height: defs.textbox_scan_height,
        padding,
    };

    let mut ink = InkBounds::new();
    for p in quad.iter().flat_map(|q| q.scan_positions(params)) {
        let window = MmRect::new(p.x, p.y, params.window_width, params.window_height);
        if geometry.coverage(surface, matrix, window) > defs.textbox_scan_coverage {
            ink.add(window);
        }
    }

    match ink.get() {
        Some(bbox)
            if bbox.width > defs.textbox_minimum_writing_width
                || bbox.height > defs.textbox_minimum_writing_height =>
        {
            BoxData::with_rect(bbox.expanded(padding + defs.textbox_extra_padding), 0.0, true)
        }
        _ => BoxData::with_rect(nominal, 0.0, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetscan_core::{GeometryError, RasterGeometry};

    #[test]
    fn ink_bounds_take_the_union() {
        let mut ink = InkBounds::new();
        assert_eq!(ink.get(), None);
        ink.add(MmRect::new(10.0, 10.0, 2.0, 2.0));
        assert_eq!(ink.get(), Some(MmRect::new(10.0, 10.0, 2.0, 2.0)));
        ink.add(MmRect::new(13.0, 8.0, 2.0, 2.0));
        assert_eq!(ink.get(), Some(MmRect::new(10.0, 8.0, 5.0, 4.0)));
        ink.add(MmRect::new(11.0, 9.0, 1.0, 1.0));
        assert_eq!(ink.get(), Some(MmRect::new(10.0, 8.0, 5.0, 4.0)));
    }

    const PX_PER_MM: f64 = 4.0;

    fn fill(img: &mut sheetscan_core::GrayImage, r: MmRect) {
        img.fill_rect(
            r.x * PX_PER_MM,
            r.y * PX_PER_MM,
            (r.x + r.width) * PX_PER_MM,
            (r.y + r.height) * PX_PER_MM,
            0,
        );
    }

    fn outlined_box(nominal: MmRect, writing: &[MmRect]) -> PageSurface {
        let mut img = sheetscan_core::GrayImage::white(400, 300);
        let line = 0.4;
        let (x, y, w, h) = (nominal.x, nominal.y, nominal.width, nominal.height);
        fill(&mut img, MmRect::new(x - line / 2.0, y - line / 2.0, w + line, line));
        fill(&mut img, MmRect::new(x - line / 2.0, y + h - line / 2.0, w + line, line));
        fill(&mut img, MmRect::new(x - line / 2.0, y - line / 2.0, line, h + line));
        fill(&mut img, MmRect::new(x + w - line / 2.0, y - line / 2.0, line, h + line));
        for r in writing {
            fill(&mut img, *r);
        }
        PageSurface::new(img, PX_PER_MM)
    }

    #[test]
    fn corners_are_refined_on_printed_outline() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let surface = outlined_box(nominal, &[]);
        let m = AffineTransform::scale(PX_PER_MM);
        let defs = RecognitionDefs::default();
        let found = refine_corners(&surface, &m, &RasterGeometry::default(), &defs, nominal)
            .expect("corners");
        for (f, e) in found.iter().zip(nominal.corners()) {
            assert!((f.x - e.x).abs() < 0.5 && (f.y - e.y).abs() < 0.5);
        }

        let mut strict = defs.clone();
        strict.find_box_corners_tolerance = 0.0;
        let shifted = MmRect::new(21.0, 20.0, 60.0, 30.0);
        assert!(
            refine_corners(&surface, &m, &RasterGeometry::default(), &strict, shifted).is_none()
        );
    }

    #[test]
    fn empty_box_reports_nominal_rect() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let surface = outlined_box(nominal, &[]);
        let data = measure_textbox(
            &surface,
            &AffineTransform::scale(PX_PER_MM),
            &RasterGeometry::default(),
            &RecognitionDefs::default(),
            nominal,
        );
        assert!(!data.state);
        assert_eq!(data.rect(), nominal);
    }

    #[test]
    fn writing_is_boxed_with_padding() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let stroke = MmRect::new(30.0, 30.0, 20.0, 3.0);
        let surface = outlined_box(nominal, &[stroke]);
        let defs = RecognitionDefs::default();
        let data = measure_textbox(
            &surface,
            &AffineTransform::scale(PX_PER_MM),
            &RasterGeometry::default(),
            &defs,
            nominal,
        );
        assert!(data.state);
        let grow = defs.textbox_scan_padding + defs.textbox_extra_padding;
        // the merged windows reach at most one window beyond the stroke
        assert!(data.x <= stroke.x - grow && data.x >= stroke.x - defs.textbox_scan_width - grow);
        assert!(data.y <= stroke.y - grow);
        assert!(data.x + data.width >= stroke.x + stroke.width + grow);
        assert!(data.y + data.height >= stroke.y + stroke.height + grow);
        assert!(data.rect().x > nominal.x - grow && data.rect().y > nominal.y - grow);
    }

    #[test]
    fn detection_is_repeatable() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let surface = outlined_box(nominal, &[MmRect::new(25.0, 40.0, 30.0, 1.5)]);
        let m = AffineTransform::scale(PX_PER_MM);
        let geo = RasterGeometry::default();
        let defs = RecognitionDefs::default();
        let first = measure_textbox(&surface, &m, &geo, &defs, nominal);
        let second = measure_textbox(&surface, &m, &geo, &defs, nominal);
        assert_eq!(first, second);
        assert!(first.state);
    }

    #[test]
    fn small_specks_are_ignored() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let speck = MmRect::new(40.0, 30.0, 0.8, 0.8);
        let surface = outlined_box(nominal, &[speck]);
        let defs = RecognitionDefs::default();
        let data = measure_textbox(
            &surface,
            &AffineTransform::scale(PX_PER_MM),
            &RasterGeometry::default(),
            &defs,
            nominal,
        );
        assert!(!data.state);
        assert_eq!(data.rect(), nominal);
    }

    /// Reports ink exactly for the windows placed at `origins`; no outline.
    struct InkAt {
        origins: Vec<(f64, f64)>,
    }

    impl GeometryPrimitives for InkAt {
        fn best_fit_affine(
            &self,
            _: &PageSurface,
            _: f64,
            _: f64,
            _: f64,
            _: f64,
        ) -> Result<AffineTransform, GeometryError> {
            Ok(AffineTransform::identity())
        }

        fn local_affine_correction(
            &self,
            _: &PageSurface,
            _: &AffineTransform,
            _: MmRect,
        ) -> AffineTransform {
            AffineTransform::identity()
        }

        fn find_quad_corners(
            &self,
            _: &PageSurface,
            _: &AffineTransform,
            _: MmRect,
        ) -> Result<[Point2<f64>; 4], GeometryError> {
            Err(GeometryError::Degenerate)
        }

        fn coverage(&self, _: &PageSurface, _: &AffineTransform, rect: MmRect) -> f64 {
            let hit = self
                .origins
                .iter()
                .any(|&(x, y)| (rect.x - x).abs() < 1e-9 && (rect.y - y).abs() < 1e-9);
            if hit {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn writing_must_exceed_the_minimum_size() {
        let nominal = MmRect::new(20.0, 20.0, 60.0, 30.0);
        let surface = PageSurface::new(sheetscan_core::GrayImage::white(1, 1), 1.0);
        let m = AffineTransform::identity();
        // two diagonal grid windows merge into a 3.5 x 3.5 mm ink box
        let geo = InkAt {
            origins: vec![(29.0, 29.0), (30.5, 30.5)],
        };
        let mut defs = RecognitionDefs::default();
        defs.textbox_minimum_writing_width = 3.5;
        defs.textbox_minimum_writing_height = 3.5;

        let data = measure_textbox(&surface, &m, &geo, &defs, nominal);
        assert!(!data.state);
        assert_eq!(data.rect(), nominal);

        defs.textbox_minimum_writing_height = 3.4;
        let data = measure_textbox(&surface, &m, &geo, &defs, nominal);
        assert!(data.state);
        let grow = defs.textbox_scan_uncorrected_padding + defs.textbox_extra_padding;
        assert_eq!(data.rect(), MmRect::new(29.0, 29.0, 3.5, 3.5).expanded(grow));

        defs.textbox_minimum_writing_height = 3.5;
        defs.textbox_minimum_writing_width = 3.4;
        assert!(measure_textbox(&surface, &m, &geo, &defs, nominal).state);
    }
}

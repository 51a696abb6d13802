//! Geometry primitives consumed by sheet recognition.
//!
//! [`GeometryPrimitives`] is the seam between the recognition pipeline and
//! whatever knows how to look at pixels. [`RasterGeometry`] is the stock
//! implementation working directly on a [`PageSurface`].

use crate::affine::{estimate_affine, max_residual, AffineTransform};
use crate::image::PageSurface;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Axis-aligned rectangle in page millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MmRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MmRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Corners in TL, TR, BR, BL order.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let (x0, y0) = (self.x, self.y);
        let (x1, y1) = (self.x + self.width, self.y + self.height);
        [
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]
    }

    #[inline]
    pub fn contains(&self, p: Point2<f64>) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }
}

/// Page corner carrying a registration mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCorner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Failures of the geometric primitives.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("corner mark not found near the {corner:?} corner")]
    CornerMarkNotFound { corner: PageCorner },
    #[error("corner marks do not fit an affine transform (residual {residual_px:.2} px)")]
    FitRejected { residual_px: f64 },
    #[error("box outline not found on the {edge} edge")]
    OutlineNotFound { edge: &'static str },
    #[error("degenerate geometry")]
    Degenerate,
}

/// Pixel-level operations the recognition pipeline depends on.
///
/// All rectangles are given in page millimetres; `transform` arguments map
/// page millimetres to surface pixels.
pub trait GeometryPrimitives {
    /// Best-fit page transform from the four corner marks sitting on the
    /// corners of the `(margin_left, margin_top, width, height)` rectangle.
    fn best_fit_affine(
        &self,
        surface: &PageSurface,
        margin_left: f64,
        margin_top: f64,
        width: f64,
        height: f64,
    ) -> Result<AffineTransform, GeometryError>;

    /// Region-local correction in page millimetres, applied on top of `base`.
    fn local_affine_correction(
        &self,
        surface: &PageSurface,
        base: &AffineTransform,
        rect: MmRect,
    ) -> AffineTransform;

    /// Observed corners (TL, TR, BR, BL) of the printed outline of `rect`.
    fn find_quad_corners(
        &self,
        surface: &PageSurface,
        base: &AffineTransform,
        rect: MmRect,
    ) -> Result<[Point2<f64>; 4], GeometryError>;

    /// Fraction of ink pixels inside `rect`, in `[0, 1]`.
    fn coverage(&self, surface: &PageSurface, transform: &AffineTransform, rect: MmRect) -> f64;
}

/// Tuning for [`RasterGeometry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterParams {
    /// Luminance below this is ink.
    pub ink_threshold: u8,
    /// Half-size of the window searched around each nominal corner mark position.
    pub mark_search_radius_mm: f64,
    /// Minimum number of ink pixels for a corner mark to count as found.
    pub min_mark_pixels: usize,
    /// Largest accepted distance between a mark and the fitted transform.
    pub max_fit_residual_px: f64,
    /// How far the outline finder sweeps across each nominal edge.
    pub outline_search_mm: f64,
    /// Minimum coverage of a probe strip lying on a printed outline.
    pub outline_min_coverage: f64,
}

impl Default for RasterParams {
    fn default() -> Self {
        Self {
            ink_threshold: 128,
            mark_search_radius_mm: 4.0,
            min_mark_pixels: 4,
            max_fit_residual_px: 6.0,
            outline_search_mm: 1.5,
            outline_min_coverage: 0.5,
        }
    }
}

/// Geometry primitives working on raw pixels.
///
/// Corner marks are expected to be solid marks centred on the corners of the
/// margin rectangle, with nothing else printed inside the search window.
#[derive(Clone, Debug, Default)]
pub struct RasterGeometry {
    pub params: RasterParams,
}

impl RasterGeometry {
    pub fn new(params: RasterParams) -> Self {
        Self { params }
    }

    fn mark_centroid(&self, surface: &PageSurface, nominal_mm: Point2<f64>) -> Option<Point2<f64>> {
        let s = surface.px_per_mm;
        let view = surface.view();
        let r = self.params.mark_search_radius_mm * s;
        let x0 = (nominal_mm.x * s - r).floor() as i64;
        let x1 = (nominal_mm.x * s + r).ceil() as i64;
        let y0 = (nominal_mm.y * s - r).floor() as i64;
        let y1 = (nominal_mm.y * s + r).ceil() as i64;

        let mut count = 0usize;
        let (mut sx, mut sy) = (0.0, 0.0);
        for y in y0..y1 {
            for x in x0..x1 {
                if view.get(x, y) < self.params.ink_threshold {
                    count += 1;
                    sx += x as f64 + 0.5;
                    sy += y as f64 + 0.5;
                }
            }
        }

        if count < self.params.min_mark_pixels.max(1) {
            return None;
        }
        Some(Point2::new(sx / count as f64, sy / count as f64))
    }

    /// Offset across an edge at which a thin strip picks up the most ink.
    fn locate_edge(
        &self,
        surface: &PageSurface,
        base: &AffineTransform,
        strip: impl Fn(f64, f64) -> MmRect,
        edge: &'static str,
    ) -> Result<f64, GeometryError> {
        let thickness = 1.0 / surface.px_per_mm.max(1e-6);
        let search = self.params.outline_search_mm;
        let steps = (2.0 * search / thickness).round().max(1.0) as usize;

        let mut best: Option<(f64, f64)> = None;
        for i in 0..=steps {
            let d = -search + i as f64 * thickness;
            let cov = self.coverage(surface, base, strip(d, thickness));
            if best.map(|(_, c)| cov > c).unwrap_or(true) {
                best = Some((d, cov));
            }
        }

        match best {
            Some((d, cov)) if cov >= self.params.outline_min_coverage => Ok(d),
            _ => Err(GeometryError::OutlineNotFound { edge }),
        }
    }
}

/// Fractions of an edge probed by the outline finder, one probe near each end.
const PROBE_SEGMENTS: [(f64, f64); 2] = [(0.10, 0.35), (0.65, 0.90)];

/// A line through two points.
type Line = (Point2<f64>, Point2<f64>);

fn intersect(a: Line, b: Line) -> Option<Point2<f64>> {
    let r: Vector2<f64> = a.1 - a.0;
    let s: Vector2<f64> = b.1 - b.0;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let qp = b.0 - a.0;
    let t = (qp.x * s.y - qp.y * s.x) / denom;
    Some(a.0 + r * t)
}

impl GeometryPrimitives for RasterGeometry {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, surface)))]
    fn best_fit_affine(
        &self,
        surface: &PageSurface,
        margin_left: f64,
        margin_top: f64,
        width: f64,
        height: f64,
    ) -> Result<AffineTransform, GeometryError> {
        let marks = [
            (PageCorner::TopLeft, Point2::new(margin_left, margin_top)),
            (PageCorner::TopRight, Point2::new(margin_left + width, margin_top)),
            (PageCorner::BottomLeft, Point2::new(margin_left, margin_top + height)),
            (
                PageCorner::BottomRight,
                Point2::new(margin_left + width, margin_top + height),
            ),
        ];

        let mut mm = Vec::with_capacity(marks.len());
        let mut px = Vec::with_capacity(marks.len());
        for (corner, nominal) in marks {
            let found = self
                .mark_centroid(surface, nominal)
                .ok_or(GeometryError::CornerMarkNotFound { corner })?;
            mm.push(nominal);
            px.push(found);
        }

        let fit = estimate_affine(&mm, &px).ok_or(GeometryError::Degenerate)?;
        let residual_px = max_residual(&fit, &mm, &px);
        log::debug!("corner mark fit residual {residual_px:.3} px");
        if residual_px > self.params.max_fit_residual_px {
            return Err(GeometryError::FitRejected { residual_px });
        }
        Ok(fit)
    }

    fn local_affine_correction(
        &self,
        surface: &PageSurface,
        base: &AffineTransform,
        rect: MmRect,
    ) -> AffineTransform {
        self.find_quad_corners(surface, base, rect)
            .ok()
            .and_then(|found| estimate_affine(&rect.corners(), &found))
            .unwrap_or_default()
    }

    fn find_quad_corners(
        &self,
        surface: &PageSurface,
        base: &AffineTransform,
        rect: MmRect,
    ) -> Result<[Point2<f64>; 4], GeometryError> {
        let MmRect {
            x,
            y,
            width: w,
            height: h,
        } = rect;
        if w <= 0.0 || h <= 0.0 {
            return Err(GeometryError::Degenerate);
        }

        let horizontal = |edge_y: f64, edge: &'static str| -> Result<Line, GeometryError> {
            let mut pts = [Point2::origin(); 2];
            for (slot, (a, b)) in pts.iter_mut().zip(PROBE_SEGMENTS) {
                let sx = x + a * w;
                let len = (b - a) * w;
                let d = self.locate_edge(
                    surface,
                    base,
                    |d, t| MmRect::new(sx, edge_y + d - 0.5 * t, len, t),
                    edge,
                )?;
                *slot = Point2::new(sx + 0.5 * len, edge_y + d);
            }
            Ok((pts[0], pts[1]))
        };
        let top = horizontal(y, "top")?;
        let bottom = horizontal(y + h, "bottom")?;

        let vertical = |edge_x: f64, edge: &'static str| -> Result<Line, GeometryError> {
            let mut pts = [Point2::origin(); 2];
            for (slot, (a, b)) in pts.iter_mut().zip(PROBE_SEGMENTS) {
                let sy = y + a * h;
                let len = (b - a) * h;
                let d = self.locate_edge(
                    surface,
                    base,
                    |d, t| MmRect::new(edge_x + d - 0.5 * t, sy, t, len),
                    edge,
                )?;
                *slot = Point2::new(edge_x + d, sy + 0.5 * len);
            }
            Ok((pts[0], pts[1]))
        };
        let left = vertical(x, "left")?;
        let right = vertical(x + w, "right")?;

        let corner = |a: Line, b: Line| intersect(a, b).ok_or(GeometryError::Degenerate);
        Ok([
            corner(top, left)?,
            corner(top, right)?,
            corner(bottom, right)?,
            corner(bottom, left)?,
        ])
    }

    fn coverage(&self, surface: &PageSurface, transform: &AffineTransform, rect: MmRect) -> f64 {
        let Some(inv) = transform.inverse() else {
            return 0.0;
        };
        let view = surface.view();

        let corners = rect.corners().map(|p| transform.apply(p));
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let x0 = min_x.floor().max(0.0) as i64;
        let y0 = min_y.floor().max(0.0) as i64;
        let x1 = (max_x.ceil() as i64).min(view.width as i64);
        let y1 = (max_y.ceil() as i64).min(view.height as i64);

        let mut total = 0usize;
        let mut ink = 0usize;
        for py in y0..y1 {
            for px in x0..x1 {
                let p_mm = inv.apply(Point2::new(px as f64 + 0.5, py as f64 + 0.5));
                if !rect.contains(p_mm) {
                    continue;
                }
                total += 1;
                if view.get(px, py) < self.params.ink_threshold {
                    ink += 1;
                }
            }
        }

        if total == 0 {
            0.0
        } else {
            ink as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayImage;
    use approx::assert_abs_diff_eq;

    const PX_PER_MM: f64 = 4.0;

    fn page(width_mm: f64, height_mm: f64) -> GrayImage {
        GrayImage::white(
            (width_mm * PX_PER_MM) as usize,
            (height_mm * PX_PER_MM) as usize,
        )
    }

    fn fill_mm(img: &mut GrayImage, r: MmRect) {
        img.fill_rect(
            r.x * PX_PER_MM,
            r.y * PX_PER_MM,
            (r.x + r.width) * PX_PER_MM,
            (r.y + r.height) * PX_PER_MM,
            0,
        );
    }

    fn outline_mm(img: &mut GrayImage, r: MmRect, line: f64) {
        fill_mm(img, MmRect::new(r.x, r.y, r.width, line));
        fill_mm(img, MmRect::new(r.x, r.y + r.height - line, r.width, line));
        fill_mm(img, MmRect::new(r.x, r.y, line, r.height));
        fill_mm(img, MmRect::new(r.x + r.width - line, r.y, line, r.height));
    }

    #[test]
    fn coverage_counts_ink_fraction() {
        let mut img = page(20.0, 20.0);
        fill_mm(&mut img, MmRect::new(5.0, 5.0, 5.0, 10.0));
        let surface = PageSurface::new(img, PX_PER_MM);
        let geo = RasterGeometry::default();
        let t = AffineTransform::scale(PX_PER_MM);

        let full = geo.coverage(&surface, &t, MmRect::new(5.0, 5.0, 5.0, 10.0));
        assert_abs_diff_eq!(full, 1.0);
        let half = geo.coverage(&surface, &t, MmRect::new(5.0, 5.0, 10.0, 10.0));
        assert_abs_diff_eq!(half, 0.5);
        let none = geo.coverage(&surface, &t, MmRect::new(12.0, 0.0, 5.0, 5.0));
        assert_abs_diff_eq!(none, 0.0);
        let outside = geo.coverage(&surface, &t, MmRect::new(40.0, 40.0, 5.0, 5.0));
        assert_abs_diff_eq!(outside, 0.0);
    }

    #[test]
    fn best_fit_recovers_shifted_page() {
        let mut img = page(100.0, 140.0);
        // marks printed 1 mm right and 0.5 mm down of their nominal position
        for (cx, cy) in [(10.0, 12.0), (90.0, 12.0), (10.0, 128.0), (90.0, 128.0)] {
            fill_mm(&mut img, MmRect::new(cx + 1.0 - 1.0, cy + 0.5 - 1.0, 2.0, 2.0));
        }
        let surface = PageSurface::new(img, PX_PER_MM);
        let geo = RasterGeometry::default();

        let t = geo
            .best_fit_affine(&surface, 10.0, 12.0, 80.0, 116.0)
            .expect("fit");
        let p = t.apply(Point2::new(50.0, 70.0));
        assert_abs_diff_eq!(p.x, 51.0 * PX_PER_MM, epsilon = 0.1);
        assert_abs_diff_eq!(p.y, 70.5 * PX_PER_MM, epsilon = 0.1);
    }

    #[test]
    fn best_fit_reports_missing_mark() {
        let mut img = page(100.0, 140.0);
        for (cx, cy) in [(10.0, 12.0), (90.0, 12.0), (10.0, 128.0)] {
            fill_mm(&mut img, MmRect::new(cx - 1.0, cy - 1.0, 2.0, 2.0));
        }
        let surface = PageSurface::new(img, PX_PER_MM);
        let err = RasterGeometry::default()
            .best_fit_affine(&surface, 10.0, 12.0, 80.0, 116.0)
            .unwrap_err();
        assert_eq!(
            err,
            GeometryError::CornerMarkNotFound {
                corner: PageCorner::BottomRight
            }
        );
    }

    #[test]
    fn quad_corners_follow_printed_outline() {
        let mut img = page(80.0, 60.0);
        outline_mm(&mut img, MmRect::new(20.5, 15.5, 40.0, 20.0), 0.5);
        let surface = PageSurface::new(img, PX_PER_MM);
        let geo = RasterGeometry::default();
        let t = AffineTransform::scale(PX_PER_MM);

        let found = geo
            .find_quad_corners(&surface, &t, MmRect::new(20.0, 15.0, 40.0, 20.0))
            .expect("outline");
        let expected = MmRect::new(20.5, 15.5, 40.0, 20.0).corners();
        for (f, e) in found.iter().zip(expected) {
            assert_abs_diff_eq!(f.x, e.x, epsilon = 0.6);
            assert_abs_diff_eq!(f.y, e.y, epsilon = 0.6);
        }
    }

    #[test]
    fn quad_corners_fail_without_outline() {
        let surface = PageSurface::new(page(80.0, 60.0), PX_PER_MM);
        let geo = RasterGeometry::default();
        let t = AffineTransform::scale(PX_PER_MM);
        assert!(matches!(
            geo.find_quad_corners(&surface, &t, MmRect::new(20.0, 15.0, 40.0, 20.0)),
            Err(GeometryError::OutlineNotFound { edge: "top" })
        ));
        let correction =
            geo.local_affine_correction(&surface, &t, MmRect::new(20.0, 15.0, 40.0, 20.0));
        assert_eq!(correction, AffineTransform::identity());
    }
}

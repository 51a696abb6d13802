//! Sampling positions over a possibly skewed box.
//!
//! Scanners add small trapezoidal distortions, so a printed rectangle is
//! handled as a general quadrilateral. Positions are the top-left corners of
//! a fixed-size test window.

use sheetscan_core::{MmRect, Point2, Vector2};
use std::iter::Chain;

/// Window size, stepping and inset of a quadrilateral scan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanParams {
    pub step_x: f64,
    pub step_y: f64,
    pub window_width: f64,
    pub window_height: f64,
    /// Distance windows keep from the box edges.
    pub padding: f64,
}

impl ScanParams {
    fn steps_valid(&self) -> bool {
        self.step_x > 0.0 && self.step_y > 0.0 && self.step_x.is_finite() && self.step_y.is_finite()
    }
}

/// Quadrilateral given by its corners in TL, TR, BR, BL order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrilateral {
    corners: [Point2<f64>; 4],
    /// Edge slopes: dy/dx for top and bottom, dx/dy for right and left.
    slopes: [f64; 4],
    top: f64,
    bottom: f64,
    left: f64,
    right: f64,
}

impl Quadrilateral {
    /// Returns `None` when an edge has no extent along its main direction.
    pub fn new(
        tl: Point2<f64>,
        tr: Point2<f64>,
        br: Point2<f64>,
        bl: Point2<f64>,
    ) -> Option<Self> {
        let slope = |num: f64, den: f64| {
            let m = num / den;
            (den != 0.0 && m.is_finite()).then_some(m)
        };
        let slopes = [
            slope(tr.y - tl.y, tr.x - tl.x)?,
            slope(br.x - tr.x, br.y - tr.y)?,
            slope(bl.y - br.y, bl.x - br.x)?,
            slope(tl.x - bl.x, tl.y - bl.y)?,
        ];
        Some(Self {
            corners: [tl, tr, br, bl],
            slopes,
            top: tl.y.min(tr.y),
            bottom: br.y.max(bl.y),
            left: tl.x.min(bl.x),
            right: tr.x.max(br.x),
        })
    }

    pub fn from_rect(rect: MmRect) -> Option<Self> {
        let [tl, tr, br, bl] = rect.corners();
        Self::new(tl, tr, br, bl)
    }

    pub fn corners(&self) -> [Point2<f64>; 4] {
        self.corners
    }

    pub fn bounding_box(&self) -> MmRect {
        MmRect::new(
            self.left,
            self.top,
            self.right - self.left,
            self.bottom - self.top,
        )
    }

    /// Whether a window at `(x, y)` stays inside all four edges by more than the padding.
    pub fn holds_window(&self, x: f64, y: f64, params: &ScanParams) -> bool {
        let [p0, p1, p2, p3] = self.corners;
        let [m0, m1, m2, m3] = self.slopes;
        let (w, h, pad) = (params.window_width, params.window_height, params.padding);

        let top = p0.y + m0 * (x - p0.x);
        let bottom = p2.y + m2 * (x - p2.x);
        let right = p1.x + m1 * (y - p1.y);
        let left = p3.x + m3 * (y - p3.y);

        top + pad < y && bottom - pad > y + h && right - pad > x + w && left + pad < x
    }

    /// Row-major grid over the bounding box, unfiltered.
    pub fn grid(&self, params: &ScanParams) -> BoundingBoxGrid {
        BoundingBoxGrid::new(self.bounding_box(), params)
    }

    /// Grid positions whose window lies wholly inside the padded quadrilateral.
    pub fn interior(&self, params: ScanParams) -> impl Iterator<Item = Point2<f64>> {
        let quad = *self;
        self.grid(&params)
            .filter(move |p| quad.holds_window(p.x, p.y, &params))
    }

    /// Walks along the four edges, inset by the padding and the window size.
    pub fn outline(&self, params: &ScanParams) -> Outline {
        let [p0, p1, p2, p3] = self.corners;
        let (w, h, pad) = (params.window_width, params.window_height, params.padding);

        let top = EdgeWalk::new(
            Point2::new(p0.x + pad, p0.y + pad),
            Point2::new(p1.x - pad - w, p1.y + pad),
            params.step_x,
        );
        let bottom = EdgeWalk::new(
            Point2::new(p3.x + pad, p3.y - pad - h),
            Point2::new(p2.x - pad - w, p2.y - pad - h),
            params.step_x,
        );
        let left = EdgeWalk::new(
            Point2::new(p0.x + pad, p0.y + pad),
            Point2::new(p3.x + pad, p3.y - pad - h),
            params.step_y,
        );
        let right = EdgeWalk::new(
            Point2::new(p1.x - pad - w, p1.y + pad),
            Point2::new(p2.x - pad - w, p2.y - pad - h),
            params.step_y,
        );
        top.chain(bottom).chain(left).chain(right)
    }

    /// Interior grid followed by the outline sweep.
    pub fn scan_positions(&self, params: ScanParams) -> impl Iterator<Item = Point2<f64>> {
        self.interior(params).chain(self.outline(&params))
    }
}

pub type Outline = Chain<Chain<Chain<EdgeWalk, EdgeWalk>, EdgeWalk>, EdgeWalk>;

/// Window positions stepping across a rectangle, row by row.
///
/// A position is produced while the window's far edge stays strictly
/// inside the rectangle.
#[derive(Clone, Debug)]
pub struct BoundingBoxGrid {
    left: f64,
    right: f64,
    bottom: f64,
    step_x: f64,
    step_y: f64,
    window_width: f64,
    window_height: f64,
    x: f64,
    y: f64,
    done: bool,
}

impl BoundingBoxGrid {
    pub fn new(area: MmRect, params: &ScanParams) -> Self {
        Self {
            left: area.x,
            right: area.x + area.width,
            bottom: area.y + area.height,
            step_x: params.step_x,
            step_y: params.step_y,
            window_width: params.window_width,
            window_height: params.window_height,
            x: area.x,
            y: area.y,
            done: !params.steps_valid(),
        }
    }
}

impl Iterator for BoundingBoxGrid {
    type Item = Point2<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if self.y + self.window_height >= self.bottom {
                self.done = true;
                break;
            }
            if self.x + self.window_width < self.right {
                let p = Point2::new(self.x, self.y);
                self.x += self.step_x;
                return Some(p);
            }
            self.x = self.left;
            self.y += self.step_y;
        }
        None
    }
}

/// Evenly spaced points from `from` to `to`, always ending on `to`.
#[derive(Clone, Debug)]
pub struct EdgeWalk {
    from: Point2<f64>,
    delta: Vector2<f64>,
    /// Fraction of `delta` covered per step.
    fraction: f64,
    steps: usize,
    index: usize,
    done: bool,
}

impl EdgeWalk {
    pub fn new(from: Point2<f64>, to: Point2<f64>, step: f64) -> Self {
        let delta = to - from;
        let length = delta.norm();
        let (steps, fraction) = if step > 0.0 && length.is_finite() && length > 0.0 {
            ((length / step).floor() as usize, step / length)
        } else {
            (0, 0.0)
        };
        Self {
            from,
            delta,
            fraction,
            steps,
            index: 0,
            done: false,
        }
    }
}

impl Iterator for EdgeWalk {
    type Item = Point2<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.index < self.steps {
            let p = self.from + self.delta * (self.index as f64 * self.fraction);
            self.index += 1;
            return Some(p);
        }
        self.done = true;
        Some(self.from + self.delta)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.done {
            0
        } else {
            self.steps - self.index + 1
        };
        (left, Some(left))
    }
}

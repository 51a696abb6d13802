use nalgebra::{DMatrix, DVector, Matrix3, Point2, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// 2-D affine map stored as a homogeneous 3×3 matrix with a fixed `[0 0 1]` last row.
///
/// Recognition uses it to go from page millimetres to scan pixels, and for
/// small region-local corrections that stay in page millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub m: Matrix3<f64>,
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    /// Uniform scale, e.g. millimetres to pixels at a given resolution.
    pub fn scale(s: f64) -> Self {
        Self::from_coefficients(s, 0.0, 0.0, s, 0.0, 0.0)
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_coefficients(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Build from the six coefficients of
    /// `x' = xx*x + xy*y + x0`, `y' = yx*x + yy*y + y0`.
    pub fn from_coefficients(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self {
        Self {
            m: Matrix3::new(
                xx, xy, x0, //
                yx, yy, y0, //
                0.0, 0.0, 1.0,
            ),
        }
    }

    /// The six coefficients in `(xx, yx, xy, yy, x0, y0)` order.
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.m[(0, 0)],
            self.m[(1, 0)],
            self.m[(0, 1)],
            self.m[(1, 1)],
            self.m[(0, 2)],
            self.m[(1, 2)],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.m * Vector3::new(p.x, p.y, 1.0);
        Point2::new(v[0], v[1])
    }

    /// Map a distance vector (linear part only, no translation).
    #[inline]
    pub fn apply_distance(&self, d: Vector2<f64>) -> Vector2<f64> {
        let v = self.m * Vector3::new(d.x, d.y, 0.0);
        Vector2::new(v[0], v[1])
    }

    pub fn inverse(&self) -> Option<Self> {
        self.m.try_inverse().map(|m| Self { m })
    }

    /// `self` followed by `next`: `next.apply(self.apply(p))`.
    pub fn then(&self, next: &AffineTransform) -> Self {
        Self { m: next.m * self.m }
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        (2.0_f64).sqrt() / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in pts {
        cx += p.x;
        cy += p.y;
    }
    cx /= n;
    cy /= n;

    let mut mean_dist = 0.0;
    for p in pts {
        mean_dist += ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
    }
    mean_dist /= n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// Least-squares affine fit such that `dst ≈ A * src`.
///
/// Needs at least three non-collinear correspondences; returns `None` for
/// mismatched inputs or a rank-deficient configuration.
pub fn estimate_affine(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<AffineTransform> {
    if src.len() != dst.len() || src.len() < 3 {
        return None;
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Both output rows share the design matrix [x y 1].
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(n, 3);
    let mut bu = DVector::<f64>::zeros(n);
    let mut bv = DVector::<f64>::zeros(n);
    for k in 0..n {
        a[(k, 0)] = s[k].x;
        a[(k, 1)] = s[k].y;
        a[(k, 2)] = 1.0;
        bu[k] = d[k].x;
        bv[k] = d[k].y;
    }

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    let min_sv = svd.singular_values.min();
    if max_sv <= 0.0 || min_sv / max_sv < 1e-9 {
        return None;
    }
    let row_u = svd.solve(&bu, 1e-12).ok()?;
    let row_v = svd.solve(&bv, 1e-12).ok()?;

    let an = Matrix3::<f64>::new(
        row_u[0], row_u[1], row_u[2], //
        row_v[0], row_v[1], row_v[2], //
        0.0, 0.0, 1.0,
    );

    // Denormalize: A = Td^{-1} * An * Ts
    let td_inv = td.try_inverse()?;
    Some(AffineTransform { m: td_inv * an * ts })
}

/// Largest distance between `t(src[i])` and `dst[i]`.
pub fn max_residual(t: &AffineTransform, src: &[Point2<f64>], dst: &[Point2<f64>]) -> f64 {
    src.iter()
        .zip(dst)
        .map(|(s, d)| (t.apply(*s) - *d).norm())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn skewed() -> AffineTransform {
        AffineTransform::from_coefficients(11.8, 0.12, -0.09, 11.7, 34.0, -12.5)
    }

    #[test]
    fn inverse_round_trips_points() {
        let t = skewed();
        let inv = t.inverse().expect("invertible");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(210.0, 297.0),
        ] {
            assert_close(inv.apply(t.apply(p)), p, 1e-9);
        }
    }

    #[test]
    fn distance_ignores_translation() {
        let t = AffineTransform::translation(5.0, 7.0).then(&AffineTransform::scale(2.0));
        let d = t.apply_distance(Vector2::new(3.0, 4.0));
        assert_relative_eq!(d.x, 6.0);
        assert_relative_eq!(d.y, 8.0);
        let p = t.apply(Point2::new(1.0, 1.0));
        assert_relative_eq!(p.x, 12.0);
        assert_relative_eq!(p.y, 16.0);
    }

    #[test]
    fn four_point_fit_recovers_transform() {
        let truth = skewed();
        let src = [
            Point2::new(10.0, 12.0),
            Point2::new(200.0, 12.0),
            Point2::new(10.0, 285.0),
            Point2::new(200.0, 285.0),
        ];
        let dst: Vec<_> = src.iter().map(|&p| truth.apply(p)).collect();
        let fit = estimate_affine(&src, &dst).expect("fit");
        for p in [Point2::new(0.0, 0.0), Point2::new(105.0, 148.5)] {
            assert_close(fit.apply(p), truth.apply(p), 1e-6);
        }
        assert!(max_residual(&fit, &src, &dst) < 1e-6);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        let dst = src;
        assert!(estimate_affine(&src, &dst).is_none());
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [Point2::new(0.0, 0.0); 4];
        let dst = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_affine(&src, &dst).is_none());
    }
}

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Determinants below this are treated as singular (H is normalized to h33 = 1).
const SINGULAR_DET_EPS: f64 = 1e-12;

/// Projective transform `p_dst ~ H * p_src` between two pixel frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let q = self.apply_f64(Point2::new(p.x as f64, p.y as f64));
        Point2::new(q.x as f32, q.y as f32)
    }

    #[inline]
    pub fn apply_f64(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    /// Euclidean distance between `H * src` and `dst`.
    ///
    /// Points mapped to infinity yield `f64::INFINITY`.
    pub fn transfer_error(&self, src: Point2<f32>, dst: Point2<f32>) -> f64 {
        let q = self.apply_f64(Point2::new(src.x as f64, src.y as f64));
        let dx = q.x - dst.x as f64;
        let dy = q.y - dst.y as f64;
        let e = (dx * dx + dy * dy).sqrt();
        if e.is_finite() {
            e
        } else {
            f64::INFINITY
        }
    }

    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    /// Inverse transform, `None` if H is (numerically) singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DET_EPS {
            return None;
        }
        let inv = self.h.try_inverse()?;
        Some(Self::new(normalize_homography(inv).unwrap_or(inv)))
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

/// Hartley normalization: centroid to origin, mean distance sqrt(2).
fn normalize_points(pts: &[Point2<f32>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let (sx, sy) = pts
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = pts
        .iter()
        .map(|p| (p.x as f64 - cx).hypot(p.y as f64 - cy))
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);

    let mut out = Vec::with_capacity(pts.len());
    for p in pts {
        let v = t * Vector3::new(p.x as f64, p.y as f64, 1.0);
        out.push(Point2::new(v[0], v[1]));
    }
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Least-squares DLT estimate of H such that `dst ~ H * src`.
///
/// Needs at least 4 correspondences; exactly 4 goes through [`homography_from_4pt`].
pub fn estimate_homography(src: &[Point2<f32>], dst: &[Point2<f32>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[Point2<f32>; 4] = src.try_into().ok()?;
        let d: &[Point2<f32>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    let mut a = DMatrix::<f64>::zeros(2 * src.len(), 9);
    for (k, (p, q)) in s.iter().zip(&d).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        a.row_mut(2 * k)
            .copy_from_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        a.row_mut(2 * k + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
    }

    // null vector of A from the 9x9 normal matrix
    let svd = (a.transpose() * &a).svd(false, true);
    let vt = svd.v_t?;
    let min_idx = svd.singular_values.imin();
    let hn = Matrix3::<f64>::from_fn(|r, c| vt[(min_idx, 3 * r + c)]);

    let h_den = denormalize_homography(hn, ts, td)?;
    let h_den = normalize_homography(h_den)?;
    let out = Homography::new(h_den);
    out.h.iter().all(|v| v.is_finite()).then_some(out)
}

/// Exact H with `dst ~ H * src` from 4 correspondences (h33 fixed to 1).
///
/// Returns `None` for degenerate configurations (e.g. three collinear points).
pub fn homography_from_4pt(src: &[Point2<f32>; 4], dst: &[Point2<f32>; 4]) -> Option<Homography> {
    // h33 = 1 leaves 8 unknowns, two equations per correspondence
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in src_n.iter().zip(&dst_n).enumerate() {
        let (x, y, u, v) = (p.x, p.y, q.x, q.y);
        a.row_mut(2 * k)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
        a.row_mut(2 * k + 1)
            .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
        b[2 * k] = u;
        b[2 * k + 1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::from_fn(|r, c| if r == 2 && c == 2 { 1.0 } else { x[3 * r + c] });

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;
    let out = Homography::new(h_den);
    out.h.iter().all(|v| v.is_finite()).then_some(out)
}

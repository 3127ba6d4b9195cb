//! Scale-space extrema, sub-pixel refinement and dominant orientations.

use nalgebra::{Matrix3, Point2, Vector3};

use super::pyramid::{FloatImage, ScaleSpace};
use super::Keypoint;

/// Ignore extrema this close to the image border.
const IMG_BORDER: usize = 5;
const MAX_INTERP_STEPS: usize = 5;
const ORI_HIST_BINS: usize = 36;
const ORI_SIG_FCTR: f32 = 1.5;
const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
const ORI_PEAK_RATIO: f32 = 0.8;

/// DoG values are on a 0..255 scale; derivatives are taken on 0..1.
const IMG_SCALE: f32 = 1.0 / 255.0;

pub(crate) struct ExtremaParams {
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
    pub sigma: f32,
}

/// Detect keypoints in all octaves. Coordinates and sizes are in the frame of
/// pyramid octave 0; `Keypoint::octave` holds the pyramid octave index.
pub(crate) fn find_scale_space_extrema(ss: &ScaleSpace, params: &ExtremaParams) -> Vec<Keypoint> {
    let layers = ss.layers;
    let threshold = (0.5 * params.contrast_threshold / layers as f32 * 255.0).floor();
    let mut keypoints = Vec::new();
    let mut hist = [0f32; ORI_HIST_BINS];

    for (o, dogs) in ss.dogs.iter().enumerate() {
        for layer in 1..=layers {
            let (img, prev, next) = (&dogs[layer], &dogs[layer - 1], &dogs[layer + 1]);
            let (w, h) = (img.width, img.height);
            if w <= 2 * IMG_BORDER || h <= 2 * IMG_BORDER {
                continue;
            }

            for r in IMG_BORDER..h - IMG_BORDER {
                for c in IMG_BORDER..w - IMG_BORDER {
                    let val = img.at(c, r);
                    if val.abs() <= threshold || !is_extremum(val, c, r, prev, img, next) {
                        continue;
                    }

                    let Some(refined) = refine_extremum(dogs, o, layer, c, r, layers, params)
                    else {
                        continue;
                    };

                    let scl_octv = refined.keypoint.size * 0.5 / (1u32 << o) as f32;
                    let gauss = &ss.gaussians[o][refined.keypoint.layer];
                    let omax = orientation_histogram(
                        gauss,
                        refined.pixel,
                        (ORI_RADIUS * scl_octv).round() as isize,
                        ORI_SIG_FCTR * scl_octv,
                        &mut hist,
                    );
                    push_orientation_peaks(
                        &hist,
                        omax * ORI_PEAK_RATIO,
                        &refined.keypoint,
                        &mut keypoints,
                    );
                }
            }
        }
    }

    keypoints
}

fn is_extremum(
    val: f32,
    c: usize,
    r: usize,
    prev: &FloatImage,
    cur: &FloatImage,
    next: &FloatImage,
) -> bool {
    for (li, img) in [prev, cur, next].into_iter().enumerate() {
        for y in r - 1..=r + 1 {
            for x in c - 1..=c + 1 {
                if li == 1 && x == c && y == r {
                    continue;
                }
                let v = img.at(x, y);
                let ok = if val > 0.0 { val >= v } else { val <= v };
                if !ok {
                    return false;
                }
            }
        }
    }
    true
}

struct Refined {
    keypoint: Keypoint,
    /// Integer DoG location the fit converged at.
    pixel: (usize, usize),
}

fn derivatives(
    dogs: &[FloatImage],
    layer: usize,
    c: usize,
    r: usize,
) -> (Vector3<f32>, Matrix3<f32>) {
    let (img, prev, next) = (&dogs[layer], &dogs[layer - 1], &dogs[layer + 1]);
    let deriv_scale = IMG_SCALE * 0.5;
    let second_deriv_scale = IMG_SCALE;
    let cross_deriv_scale = IMG_SCALE * 0.25;

    let d = Vector3::new(
        (img.at(c + 1, r) - img.at(c - 1, r)) * deriv_scale,
        (img.at(c, r + 1) - img.at(c, r - 1)) * deriv_scale,
        (next.at(c, r) - prev.at(c, r)) * deriv_scale,
    );

    let v2 = img.at(c, r) * 2.0;
    let dxx = (img.at(c + 1, r) + img.at(c - 1, r) - v2) * second_deriv_scale;
    let dyy = (img.at(c, r + 1) + img.at(c, r - 1) - v2) * second_deriv_scale;
    let dss = (next.at(c, r) + prev.at(c, r) - v2) * second_deriv_scale;
    let dxy = (img.at(c + 1, r + 1) - img.at(c - 1, r + 1) - img.at(c + 1, r - 1)
        + img.at(c - 1, r - 1))
        * cross_deriv_scale;
    let dxs = (next.at(c + 1, r) - next.at(c - 1, r) - prev.at(c + 1, r) + prev.at(c - 1, r))
        * cross_deriv_scale;
    let dys = (next.at(c, r + 1) - next.at(c, r - 1) - prev.at(c, r + 1) + prev.at(c, r - 1))
        * cross_deriv_scale;

    let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
    (d, hessian)
}

/// Fit a quadratic around the DoG extremum and move it to the sub-pixel peak.
///
/// Rejects points that drift off the grid, have low contrast or sit on an
/// edge (principal curvature ratio above `edge_threshold`).
fn refine_extremum(
    dogs: &[FloatImage],
    octave: usize,
    mut layer: usize,
    mut c: usize,
    mut r: usize,
    layers: usize,
    params: &ExtremaParams,
) -> Option<Refined> {
    let (w, h) = (dogs[0].width, dogs[0].height);
    let mut offset = Vector3::zeros();
    let mut converged = false;

    for _ in 0..MAX_INTERP_STEPS {
        let (d, hessian) = derivatives(dogs, layer, c, r);
        let x = hessian.lu().solve(&d)?;
        offset = -x;

        if offset.iter().all(|v| v.abs() < 0.5) {
            converged = true;
            break;
        }
        if offset.iter().any(|v| !v.is_finite() || v.abs() > (i32::MAX / 3) as f32) {
            return None;
        }

        let nc = c as isize + offset[0].round() as isize;
        let nr = r as isize + offset[1].round() as isize;
        let nl = layer as isize + offset[2].round() as isize;
        if nl < 1
            || nl > layers as isize
            || nc < IMG_BORDER as isize
            || nc >= (w - IMG_BORDER) as isize
            || nr < IMG_BORDER as isize
            || nr >= (h - IMG_BORDER) as isize
        {
            return None;
        }
        (c, r, layer) = (nc as usize, nr as usize, nl as usize);
    }
    if !converged {
        return None;
    }

    let (d, hessian) = derivatives(dogs, layer, c, r);
    let contrast = dogs[layer].at(c, r) * IMG_SCALE + d.dot(&offset) * 0.5;
    if contrast.abs() * (layers as f32) < params.contrast_threshold {
        return None;
    }

    let (dxx, dyy, dxy) = (hessian[(0, 0)], hessian[(1, 1)], hessian[(0, 1)]);
    let tr = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let et = params.edge_threshold;
    if det <= 0.0 || tr * tr * et >= (et + 1.0) * (et + 1.0) * det {
        return None;
    }

    let scale = (1u32 << octave) as f32;
    let size = params.sigma * 2f32.powf((layer as f32 + offset[2]) / layers as f32) * scale * 2.0;
    Some(Refined {
        keypoint: Keypoint {
            position: Point2::new((c as f32 + offset[0]) * scale, (r as f32 + offset[1]) * scale),
            size,
            angle: -1.0,
            response: contrast.abs(),
            octave: octave as i32,
            layer,
        },
        pixel: (c, r),
    })
}

/// Gradient orientation histogram around `pt`, smoothed; returns its maximum.
fn orientation_histogram(
    img: &FloatImage,
    pt: (usize, usize),
    radius: isize,
    sigma: f32,
    hist: &mut [f32; ORI_HIST_BINS],
) -> f32 {
    let n = ORI_HIST_BINS;
    let expf_scale = -1.0 / (2.0 * sigma * sigma);
    let mut raw = [0f32; ORI_HIST_BINS];
    let (w, h) = (img.width as isize, img.height as isize);
    let (px, py) = (pt.0 as isize, pt.1 as isize);

    for i in -radius..=radius {
        let y = py + i;
        if y <= 0 || y >= h - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = px + j;
            if x <= 0 || x >= w - 1 {
                continue;
            }
            let (xu, yu) = (x as usize, y as usize);
            let dx = img.at(xu + 1, yu) - img.at(xu - 1, yu);
            let dy = img.at(xu, yu - 1) - img.at(xu, yu + 1);
            let weight = (((i * i + j * j) as f32) * expf_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt();
            let ori = degrees_0_360(dy.atan2(dx));

            let mut bin = (ori * n as f32 / 360.0).round() as isize;
            if bin >= n as isize {
                bin -= n as isize;
            }
            if bin < 0 {
                bin += n as isize;
            }
            raw[bin as usize] += weight * mag;
        }
    }

    let at = |k: isize| raw[k.rem_euclid(n as isize) as usize];
    let mut omax = 0.0f32;
    for (i, out) in hist.iter_mut().enumerate() {
        let i = i as isize;
        *out = (at(i - 2) + at(i + 2)) * (1.0 / 16.0)
            + (at(i - 1) + at(i + 1)) * (4.0 / 16.0)
            + at(i) * (6.0 / 16.0);
        omax = omax.max(*out);
    }
    omax
}

fn push_orientation_peaks(
    hist: &[f32; ORI_HIST_BINS],
    mag_thr: f32,
    base: &Keypoint,
    out: &mut Vec<Keypoint>,
) {
    let n = ORI_HIST_BINS;
    for j in 0..n {
        let l = if j > 0 { j - 1 } else { n - 1 };
        let r = if j + 1 < n { j + 1 } else { 0 };
        if !(hist[j] > hist[l] && hist[j] > hist[r] && hist[j] >= mag_thr) {
            continue;
        }
        let mut bin = j as f32 + 0.5 * (hist[l] - hist[r]) / (hist[l] - 2.0 * hist[j] + hist[r]);
        if bin < 0.0 {
            bin += n as f32;
        } else if bin >= n as f32 {
            bin -= n as f32;
        }
        let mut angle = 360.0 - (360.0 / n as f32) * bin;
        if (angle - 360.0).abs() < f32::EPSILON {
            angle = 0.0;
        }
        out.push(Keypoint { angle, ..*base });
    }
}

/// `atan2` result in degrees, mapped to `[0, 360)`.
#[inline]
pub(crate) fn degrees_0_360(rad: f32) -> f32 {
    let mut deg = rad.to_degrees();
    if deg < 0.0 {
        deg += 360.0;
    }
    if deg >= 360.0 {
        deg -= 360.0;
    }
    deg
}

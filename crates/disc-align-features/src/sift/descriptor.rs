use super::extrema::degrees_0_360;
use super::pyramid::FloatImage;
use super::{Descriptor, DESCRIPTOR_LEN};

const DESCR_WIDTH: usize = 4;
const DESCR_HIST_BINS: usize = 8;
const DESCR_SCL_FCTR: f32 = 3.0;
const DESCR_MAG_THR: f32 = 0.2;
const INT_DESCR_FCTR: f32 = 512.0;

/// 4x4 spatial cells of 8 orientation bins around `pt`, rotated by `ori`
/// degrees, for a keypoint of octave-local scale `scl`.
///
/// Values are normalized, clipped, rescaled to `0..=255` and rounded.
pub(crate) fn compute_descriptor(img: &FloatImage, pt: (f32, f32), ori: f32, scl: f32) -> Descriptor {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (px, py) = (pt.0.round() as isize, pt.1.round() as isize);
    let (rows, cols) = (img.height as isize, img.width as isize);

    let (sin_t, cos_t) = ori.to_radians().sin_cos();
    let bins_per_deg = n as f32 / 360.0;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = DESCR_SCL_FCTR * scl;
    let max_radius = ((rows * rows + cols * cols) as f32).sqrt();
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5)
        .round()
        .min(max_radius) as isize;
    let (cos_t, sin_t) = (cos_t / hist_width, sin_t / hist_width);

    // (d+2) x (d+2) x (n+2) with a one-cell guard ring and two wrap bins
    let mut hist = vec![0f32; (d + 2) * (d + 2) * (n + 2)];
    let half = d as f32 / 2.0 - 0.5;

    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + half;
            let cbin = c_rot + half;
            let (r, c) = (py + i, px + j);

            if !(rbin > -1.0 && rbin < d as f32 && cbin > -1.0 && cbin < d as f32) {
                continue;
            }
            if r <= 0 || r >= rows - 1 || c <= 0 || c >= cols - 1 {
                continue;
            }

            let (ru, cu) = (r as usize, c as usize);
            let dx = img.at(cu + 1, ru) - img.at(cu - 1, ru);
            let dy = img.at(cu, ru - 1) - img.at(cu, ru + 1);
            let grad_ori = degrees_0_360(dy.atan2(dx));
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt() * weight;

            accumulate(&mut hist, rbin, cbin, (grad_ori - ori) * bins_per_deg, mag);
        }
    }

    let mut out = [0f32; DESCRIPTOR_LEN];
    for i in 0..d {
        for j in 0..d {
            let idx = ((i + 1) * (d + 2) + (j + 1)) * (n + 2);
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            let dst = (i * d + j) * n;
            out[dst..dst + n].copy_from_slice(&hist[idx..idx + n]);
        }
    }

    normalize_descriptor(&mut out);
    out
}

/// Trilinear vote into the guarded histogram.
fn accumulate(hist: &mut [f32], rbin: f32, cbin: f32, obin: f32, mag: f32) {
    let d = DESCR_WIDTH as isize;
    let n = DESCR_HIST_BINS as isize;

    let r0 = rbin.floor();
    let c0 = cbin.floor();
    let o0 = obin.floor();
    let (fr, fc, fo) = (rbin - r0, cbin - c0, obin - o0);
    let mut o0 = o0 as isize;
    if o0 < 0 {
        o0 += n;
    }
    if o0 >= n {
        o0 -= n;
    }

    let v_r1 = mag * fr;
    let v_r0 = mag - v_r1;
    let v_rc11 = v_r1 * fc;
    let v_rc10 = v_r1 - v_rc11;
    let v_rc01 = v_r0 * fc;
    let v_rc00 = v_r0 - v_rc01;
    let v_rco111 = v_rc11 * fo;
    let v_rco110 = v_rc11 - v_rco111;
    let v_rco101 = v_rc10 * fo;
    let v_rco100 = v_rc10 - v_rco101;
    let v_rco011 = v_rc01 * fo;
    let v_rco010 = v_rc01 - v_rco011;
    let v_rco001 = v_rc00 * fo;
    let v_rco000 = v_rc00 - v_rco001;

    let row = (d + 2) * (n + 2);
    let idx = (((r0 as isize + 1) * (d + 2) + c0 as isize + 1) * (n + 2) + o0) as usize;
    let (row, cell) = (row as usize, (n + 2) as usize);
    hist[idx] += v_rco000;
    hist[idx + 1] += v_rco001;
    hist[idx + cell] += v_rco010;
    hist[idx + cell + 1] += v_rco011;
    hist[idx + row] += v_rco100;
    hist[idx + row + 1] += v_rco101;
    hist[idx + row + cell] += v_rco110;
    hist[idx + row + cell + 1] += v_rco111;
}

fn normalize_descriptor(v: &mut Descriptor) {
    let nrm2: f32 = v.iter().map(|x| x * x).sum();
    let thr = nrm2.sqrt() * DESCR_MAG_THR;

    let mut clipped = 0.0f32;
    for x in v.iter_mut() {
        *x = x.min(thr);
        clipped += *x * *x;
    }
    let scale = INT_DESCR_FCTR / clipped.sqrt().max(f32::EPSILON);
    for x in v.iter_mut() {
        *x = (*x * scale).round().clamp(0.0, 255.0);
    }
}

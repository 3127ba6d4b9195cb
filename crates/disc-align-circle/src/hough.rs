use disc_align_core::GrayImageView;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::edges::{canny, sobel};
use crate::median::median_blur;
use crate::params::HoughCircleParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Detected circle in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2<f32>,
    pub radius: f32,
    /// Edge pixels in the chosen radius shell.
    pub votes: u32,
}

/// Shell width used when grouping edge distances into radius hypotheses.
const SHELL_WIDTH: f32 = 1.0;

/// Hough-gradient circle detection on a grayscale image.
///
/// Circles are returned in acceptance order: strongest center first.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, params), fields(width = src.width, height = src.height))
)]
pub fn detect_circles(src: &GrayImageView<'_>, params: &HoughCircleParams) -> Vec<Circle> {
    let (w, h) = (src.width, src.height);
    if w < 3 || h < 3 || params.max_radius < params.min_radius {
        return Vec::new();
    }

    let blurred = median_blur(src, params.median_kernel);
    let grad = sobel(&blurred.view());
    let edges = canny(&grad, (params.canny_high * 0.5).max(1.0), params.canny_high);

    let mut edge_points = Vec::new();
    let mut acc = vec![0u32; w * h];
    let min_r = params.min_radius.max(1) as f32;
    let max_r = params.max_radius as f32;

    for y in 0..h {
        for x in 0..w {
            if edges.get(x, y) == 0 {
                continue;
            }
            let (gx, gy) = grad.at(x, y);
            if gx == 0 && gy == 0 {
                continue;
            }
            let norm = (gx as f32).hypot(gy as f32);
            let (ux, uy) = (gx as f32 / norm, gy as f32 / norm);

            for sign in [1.0f32, -1.0] {
                let mut r = min_r;
                while r <= max_r {
                    let cx = (x as f32 + sign * r * ux).round();
                    let cy = (y as f32 + sign * r * uy).round();
                    if cx < 0.0 || cy < 0.0 || cx >= w as f32 || cy >= h as f32 {
                        break;
                    }
                    acc[cy as usize * w + cx as usize] += 1;
                    r += 1.0;
                }
            }
            edge_points.push((x as f32, y as f32));
        }
    }

    // rounding and gradient-direction error smear a center's votes over a
    // few cells, so candidates are scored on 3x3 box sums
    let score = box_sum_3x3(&acc, w, h);
    let mut centers = Vec::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let v = score[i];
            if v > params.accumulator_threshold
                && v > score[i - 1]
                && v >= score[i + 1]
                && v > score[i - w]
                && v >= score[i + w]
            {
                centers.push((v, i));
            }
        }
    }
    centers.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    debug!(
        "hough: {} edge pixels, {} center candidates",
        edge_points.len(),
        centers.len()
    );

    let min_dist = params.min_dist(h);
    let min_dist_sq = min_dist * min_dist;
    let (min_r_sq, max_r_sq) = (min_r * min_r, max_r * max_r);

    let mut circles: Vec<Circle> = Vec::new();
    let mut dists = Vec::with_capacity(edge_points.len());

    for &(_, idx) in &centers {
        let (cx, cy) = refine_center(&acc, w, h, idx);

        let too_close = circles.iter().any(|c| {
            let dx = c.center.x - cx;
            let dy = c.center.y - cy;
            dx * dx + dy * dy < min_dist_sq
        });
        if too_close {
            continue;
        }

        dists.clear();
        for &(ex, ey) in &edge_points {
            let (dx, dy) = (ex - cx, ey - cy);
            if dx.abs() > max_r || dy.abs() > max_r {
                continue;
            }
            let d2 = dx * dx + dy * dy;
            if d2 >= min_r_sq && d2 <= max_r_sq {
                dists.push(d2.sqrt());
            }
        }
        if dists.is_empty() {
            continue;
        }
        dists.sort_unstable_by(f32::total_cmp);

        let (radius, support) = best_radius_shell(&dists);
        if support > params.accumulator_threshold as usize {
            circles.push(Circle {
                center: Point2::new(cx, cy),
                radius,
                votes: support as u32,
            });
        }
    }

    debug!("hough: accepted {} circles", circles.len());
    circles
}

/// Sum of every 3x3 neighbourhood, cells outside the image count as zero.
fn box_sum_3x3(acc: &[u32], w: usize, h: usize) -> Vec<u32> {
    let mut rows = vec![0u32; w * h];
    for (src, dst) in acc.chunks_exact(w).zip(rows.chunks_exact_mut(w)) {
        for x in 0..w {
            let lo = x.saturating_sub(1);
            let hi = (x + 1).min(w - 1);
            dst[x] = src[lo..=hi].iter().sum();
        }
    }
    let mut out = vec![0u32; w * h];
    for y in 0..h {
        let lo = y.saturating_sub(1);
        let hi = (y + 1).min(h - 1);
        for x in 0..w {
            out[y * w + x] = (lo..=hi).map(|yy| rows[yy * w + x]).sum();
        }
    }
    out
}

/// Vote-weighted centroid of the 7x7 window around `idx`, re-centered until
/// it settles.
fn refine_center(acc: &[u32], w: usize, h: usize, idx: usize) -> (f32, f32) {
    const HALF: isize = 3;
    let (mut cx, mut cy) = ((idx % w) as f32, (idx / w) as f32);
    for _ in 0..5 {
        let (ix, iy) = (cx.round() as isize, cy.round() as isize);
        let (mut sum, mut sx, mut sy) = (0.0f32, 0.0f32, 0.0f32);
        for y in (iy - HALF).max(0)..=(iy + HALF).min(h as isize - 1) {
            for x in (ix - HALF).max(0)..=(ix + HALF).min(w as isize - 1) {
                let v = acc[y as usize * w + x as usize] as f32;
                sum += v;
                sx += v * x as f32;
                sy += v * y as f32;
            }
        }
        if sum <= 0.0 {
            break;
        }
        let (nx, ny) = (sx / sum, sy / sum);
        let settled = (nx - cx).abs() < 0.05 && (ny - cy).abs() < 0.05;
        (cx, cy) = (nx, ny);
        if settled {
            break;
        }
    }
    (cx, cy)
}

/// Pick the radius shell with the best `count / radius` ratio.
///
/// `dists` must be sorted ascending. Shells start at the smallest remaining
/// distance and span `SHELL_WIDTH`; the shell radius is its median distance.
/// Later (larger) shells win ties.
fn best_radius_shell(dists: &[f32]) -> (f32, usize) {
    let mut best_r = 0.0f32;
    let mut best_count = 0usize;

    let mut consider = |start: usize, end: usize| {
        let count = end - start;
        let r_cur = dists[(start + end - 1) / 2];
        if count as f32 * best_r >= best_count as f32 * r_cur
            || (best_r < f32::EPSILON && count >= best_count)
        {
            best_r = r_cur;
            best_count = count;
        }
    };

    let mut start = 0;
    for j in 1..dists.len() {
        if dists[j] - dists[start] > SHELL_WIDTH {
            consider(start, j);
            start = j;
        }
    }
    consider(start, dists.len());

    (best_r, best_count)
}

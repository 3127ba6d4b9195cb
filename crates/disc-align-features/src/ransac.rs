//! Model-agnostic RANSAC and the homography estimator used for registration.
//!
//! Implement [`Estimator`] for a model and call [`ransac`] with the data and
//! [`RansacOptions`]. When no consensus is found the result has
//! `model == None`; nothing panics.

use disc_align_core::{estimate_homography, homography_from_4pt, Homography};
use nalgebra::Point2;
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacOptions {
    pub max_iters: usize,
    /// Inlier iff residual <= `thresh`.
    pub thresh: f64,
    pub min_inliers: usize,
    /// Desired probability of drawing at least one all-inlier sample.
    pub confidence: f64,
    /// Fixed seed for reproducible runs; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Refit every candidate on its inliers and rescore.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            thresh: 3.0,
            min_inliers: 4,
            confidence: 0.995,
            seed: None,
            refit_on_inliers: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RansacResult<M> {
    pub model: Option<M>,
    /// Indices of inlier data points.
    pub inliers: Vec<usize>,
    pub inlier_rms: f64,
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

impl<M> RansacResult<M> {
    /// One flag per datum.
    pub fn inlier_mask(&self, n: usize) -> Vec<bool> {
        let mut mask = vec![false; n];
        for &i in &self.inliers {
            mask[i] = true;
        }
        mask
    }
}

pub trait Estimator {
    type Datum;
    type Model;

    const MIN_SAMPLES: usize;

    /// Fit from a minimal sample; `None` if fitting fails.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative error in the units of `RansacOptions::thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / vals.len() as f64).sqrt()
}

/// Iterations needed to hit `confidence` at the current inlier ratio.
fn calculate_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n_iter = ((1.0 - confidence).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

fn score<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best: RansacResult<E::Model> = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut dynamic_max_iters = opts.max_iters;
    let mut inliers = Vec::new();
    let mut residuals = Vec::new();
    let mut refit_inliers = Vec::new();
    let mut refit_residuals = Vec::new();

    let mut iters = 0;
    while iters < dynamic_max_iters {
        iters += 1;
        all_indices
            .choose_multiple(&mut rng, E::MIN_SAMPLES)
            .enumerate()
            .for_each(|(k, &idx)| sample[k] = idx);

        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(model) = E::fit(data, &sample) else {
            continue;
        };

        score::<E>(data, &model, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < opts.min_inliers.max(E::MIN_SAMPLES) {
            continue;
        }

        let mut model = model;
        let mut final_inliers = &inliers;
        let mut final_residuals = &residuals;
        if opts.refit_on_inliers {
            if let Some(m2) = E::refit(data, &inliers) {
                score::<E>(data, &m2, opts.thresh, &mut refit_inliers, &mut refit_residuals);
                if refit_inliers.len() >= inliers.len() {
                    model = m2;
                    final_inliers = &refit_inliers;
                    final_residuals = &refit_residuals;
                }
            }
        }

        let final_rms = rms(final_residuals);
        let better = best.model.is_none()
            || final_inliers.len() > best.inliers.len()
            || (final_inliers.len() == best.inliers.len() && final_rms < best.inlier_rms);
        if better {
            best.model = Some(model);
            best.inliers = final_inliers.clone();
            best.inlier_rms = final_rms;
            best.iters = iters;
        }

        let ratio = best.inliers.len() as f64 / data.len() as f64;
        dynamic_max_iters =
            calculate_iterations(opts.confidence, ratio, E::MIN_SAMPLES, iters, opts.max_iters);
    }

    best
}

/// `(source, target)` point pair.
pub type Correspondence = (Point2<f32>, Point2<f32>);

/// Four-point homography hypotheses scored by forward transfer error.
pub struct HomographyEstimator;

fn collinear(a: Point2<f32>, b: Point2<f32>, c: Point2<f32>) -> bool {
    let cross = (b.x - a.x) as f64 * (c.y - a.y) as f64 - (b.y - a.y) as f64 * (c.x - a.x) as f64;
    let scale = ((b - a).norm() as f64 * (c - a).norm() as f64).max(f64::EPSILON);
    cross.abs() / scale < 1e-6
}

impl Estimator for HomographyEstimator {
    type Datum = Correspondence;
    type Model = Homography;

    const MIN_SAMPLES: usize = 4;

    fn fit(data: &[Self::Datum], sample: &[usize]) -> Option<Self::Model> {
        let src = [0, 1, 2, 3].map(|k| data[sample[k]].0);
        let dst = [0, 1, 2, 3].map(|k| data[sample[k]].1);
        homography_from_4pt(&src, &dst)
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        model.transfer_error(datum.0, datum.1)
    }

    fn is_degenerate(data: &[Self::Datum], sample: &[usize]) -> bool {
        let triples = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
        let sides: [fn(&Correspondence) -> Point2<f32>; 2] = [|d| d.0, |d| d.1];
        sides.iter().any(|side| {
            triples.iter().any(|&(i, j, k)| {
                collinear(
                    side(&data[sample[i]]),
                    side(&data[sample[j]]),
                    side(&data[sample[k]]),
                )
            })
        })
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        let src: Vec<_> = inliers.iter().map(|&i| data[i].0).collect();
        let dst: Vec<_> = inliers.iter().map(|&i| data[i].1).collect();
        estimate_homography(&src, &dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn iteration_bound_shrinks_with_inlier_ratio() {
        let n_all = calculate_iterations(0.995, 1.0, 4, 1, 2000);
        let n_half = calculate_iterations(0.995, 0.5, 4, 1, 2000);
        assert!(n_all <= 2);
        assert!(n_half > 50 && n_half < 2000, "{n_half}");
        assert_eq!(calculate_iterations(0.995, 0.0, 4, 1, 2000), 2000);
    }

    #[test]
    fn collinear_sample_is_degenerate() {
        let p = |x: f32, y: f32| (Point2::new(x, y), Point2::new(x, y));
        let data = [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(5.0, 0.0)];
        assert!(HomographyEstimator::is_degenerate(&data, &[0, 1, 2, 3]));
        let data = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        assert!(!HomographyEstimator::is_degenerate(&data, &[0, 1, 2, 3]));
    }

    #[test]
    fn recovers_homography_with_outliers() {
        let h_true = Homography::from_array([
            [0.95, 0.08, 12.0],
            [-0.05, 1.02, -7.0],
            [1e-4, -5e-5, 1.0],
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Vec::new();
        let mut is_outlier = Vec::new();
        for i in 0..100 {
            let src = Point2::new(rng.random_range(0.0..200.0f32), rng.random_range(0.0..200.0f32));
            let outlier = i % 10 < 3;
            let dst = if outlier {
                Point2::new(rng.random_range(0.0..200.0f32), rng.random_range(0.0..200.0f32))
            } else {
                let q = h_true.apply(src);
                Point2::new(
                    q.x + rng.random_range(-0.3..0.3f32),
                    q.y + rng.random_range(-0.3..0.3f32),
                )
            };
            data.push((src, dst));
            is_outlier.push(outlier);
        }

        let opts = RansacOptions {
            seed: Some(42),
            ..RansacOptions::default()
        };
        let res = ransac::<HomographyEstimator>(&data, &opts);
        let h = res.model.expect("consensus");

        for (k, (src, _)) in data.iter().enumerate().filter(|(k, _)| !is_outlier[*k]) {
            let err = h.transfer_error(*src, h_true.apply(*src));
            assert!(err < 1.0, "point {k}: {err}");
        }

        let mask = res.inlier_mask(data.len());
        let flagged_inliers = mask.iter().filter(|&&m| m).count();
        assert!(flagged_inliers >= 68, "{flagged_inliers}");
        // a random outlier may land within 3 px by chance, but not many
        let leaked = mask
            .iter()
            .zip(&is_outlier)
            .filter(|(m, o)| **m && **o)
            .count();
        assert!(leaked <= 2, "{leaked}");
    }

    #[test]
    fn too_little_data_has_no_model() {
        let data = [(Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)); 3];
        let res = ransac::<HomographyEstimator>(&data, &RansacOptions::default());
        assert!(res.model.is_none());
        assert!(res.inliers.is_empty());
    }
}

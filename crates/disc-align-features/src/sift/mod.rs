//! Scale-invariant keypoints and 128-D gradient descriptors.
//!
//! The base image is optionally doubled, blurred to `sigma` and decomposed
//! into octaves of `n_octave_layers + 3` Gaussian images. Keypoints are DoG
//! extrema refined to sub-pixel accuracy, filtered by contrast and edge
//! response, and assigned one or more dominant orientations.

mod descriptor;
mod extrema;
mod pyramid;

use disc_align_core::GrayImageView;
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use descriptor::compute_descriptor;
use extrema::{find_scale_space_extrema, ExtremaParams};
use pyramid::{FloatImage, ScaleSpace};

pub const DESCRIPTOR_LEN: usize = 128;

/// Descriptor vector; entries are integral values in `0..=255`.
pub type Descriptor = [f32; DESCRIPTOR_LEN];

/// Assumed blur of the input image.
const INIT_SIGMA: f32 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftParams {
    /// Keep only the strongest `n_features` keypoints; 0 keeps all.
    pub n_features: usize,
    pub n_octave_layers: usize,
    pub contrast_threshold: f32,
    pub edge_threshold: f32,
    pub sigma: f32,
    /// Double the input before building the pyramid.
    pub upscale: bool,
}

impl Default for SiftParams {
    fn default() -> Self {
        Self {
            n_features: 0,
            n_octave_layers: 3,
            contrast_threshold: 0.02,
            edge_threshold: 50.0,
            sigma: 1.6,
            upscale: true,
        }
    }
}

/// Oriented keypoint in input pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub position: Point2<f32>,
    /// Diameter of the meaningful neighbourhood.
    pub size: f32,
    /// Dominant orientation in degrees, `[0, 360)`.
    pub angle: f32,
    pub response: f32,
    /// Octave relative to the input resolution (`-1` for the doubled base).
    pub octave: i32,
    pub layer: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Sift {
    pub params: SiftParams,
}

impl Sift {
    pub fn new(params: SiftParams) -> Self {
        Self { params }
    }

    /// Detect keypoints and compute one descriptor per keypoint.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn detect_and_compute(&self, img: &GrayImageView<'_>) -> (Vec<Keypoint>, Vec<Descriptor>) {
        let p = &self.params;
        let layers = p.n_octave_layers.max(1);
        let first_octave: i32 = if p.upscale { -1 } else { 0 };

        let mut base = FloatImage::from_gray(img);
        let sig_diff = if p.upscale {
            base = base.upsample2x();
            (p.sigma * p.sigma - 4.0 * INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt()
        } else {
            (p.sigma * p.sigma - INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt()
        };
        let min_side = base.width.min(base.height);
        if min_side < 8 {
            return (Vec::new(), Vec::new());
        }
        let base = base.gaussian_blur(sig_diff);

        let n_octaves = octave_count(min_side, first_octave);
        let ss = ScaleSpace::build(base, n_octaves, layers, p.sigma);

        let mut keypoints = find_scale_space_extrema(
            &ss,
            &ExtremaParams {
                contrast_threshold: p.contrast_threshold,
                edge_threshold: p.edge_threshold,
                sigma: p.sigma,
            },
        );
        let found = keypoints.len();
        remove_duplicates(&mut keypoints);
        if p.n_features > 0 {
            retain_best(&mut keypoints, p.n_features);
        }

        let to_input = 2f32.powi(first_octave);
        let descriptors = keypoints
            .iter_mut()
            .map(|kp| {
                let o = kp.octave as usize;
                let octave_scale = 1.0 / (1u32 << o) as f32;
                let mut angle = 360.0 - kp.angle;
                if (angle - 360.0).abs() < f32::EPSILON {
                    angle = 0.0;
                }
                let desc = compute_descriptor(
                    &ss.gaussians[o][kp.layer],
                    (kp.position.x * octave_scale, kp.position.y * octave_scale),
                    angle,
                    kp.size * octave_scale * 0.5,
                );

                kp.position = Point2::new(kp.position.x * to_input, kp.position.y * to_input);
                kp.size *= to_input;
                kp.octave += first_octave;
                desc
            })
            .collect();

        debug!(
            "sift: {} octaves, {} extrema, {} keypoints",
            n_octaves,
            found,
            keypoints.len()
        );
        (keypoints, descriptors)
    }
}

/// Octaves for a pyramid whose base has `min_side` pixels on its short side.
///
/// Counted from the input resolution, so an upscaled base gets one extra.
fn octave_count(min_side: usize, first_octave: i32) -> usize {
    (((min_side as f32).log2() - 2.0).round() - first_octave as f32).max(1.0) as usize
}

fn remove_duplicates(kps: &mut Vec<Keypoint>) {
    kps.sort_by(|a, b| {
        a.position
            .x
            .total_cmp(&b.position.x)
            .then(a.position.y.total_cmp(&b.position.y))
            .then(b.size.total_cmp(&a.size))
            .then(a.angle.total_cmp(&b.angle))
            .then(b.response.total_cmp(&a.response))
    });
    kps.dedup_by(|b, a| a.position == b.position && a.size == b.size && a.angle == b.angle);
}

/// Keep the `n` strongest responses; ties with the n-th are kept too.
fn retain_best(kps: &mut Vec<Keypoint>, n: usize) {
    if kps.len() <= n {
        return;
    }
    let mut responses: Vec<f32> = kps.iter().map(|k| k.response).collect();
    responses.sort_unstable_by(|a, b| b.total_cmp(a));
    let cutoff = responses[n - 1];
    kps.retain(|k| k.response >= cutoff);
}

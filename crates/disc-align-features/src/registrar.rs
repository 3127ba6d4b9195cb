use disc_align_core::{GrayImageView, Homography, RgbImage};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::matching::{knn2, ratio_test, Match};
use crate::ransac::{ransac, Correspondence, HomographyEstimator, RansacOptions};
use crate::sift::{Keypoint, Sift, SiftParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("too few matches to estimate a homography ({found} found, {required} required)")]
    TooFewMatches { found: usize, required: usize },
    #[error("RANSAC found no consensus homography")]
    NoConsensus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationParams {
    pub sift: SiftParams,
    /// Lowe ratio: keep a match when `nearest < ratio * second`.
    pub ratio: f32,
    pub ransac: RansacOptions,
    /// Ratio-tested matches needed before RANSAC runs.
    pub min_matches: usize,
}

impl Default for RegistrationParams {
    fn default() -> Self {
        Self {
            sift: SiftParams::default(),
            ratio: 0.7,
            ransac: RansacOptions::default(),
            min_matches: 4,
        }
    }
}

/// Homography from a source image onto a target image, with the evidence.
#[derive(Clone, Debug)]
pub struct Registration {
    /// Maps source pixel coordinates to target pixel coordinates.
    pub homography: Homography,
    pub src_keypoints: Vec<Keypoint>,
    pub trg_keypoints: Vec<Keypoint>,
    /// Ratio-test survivors; `query_idx` indexes the source keypoints.
    pub matches: Vec<Match>,
    /// One flag per entry of `matches`.
    pub inlier_mask: Vec<bool>,
}

impl Registration {
    pub fn inlier_count(&self) -> usize {
        self.inlier_mask.iter().filter(|&&m| m).count()
    }

    pub fn inlier_ratio(&self) -> f64 {
        if self.matches.is_empty() {
            return 0.0;
        }
        self.inlier_count() as f64 / self.matches.len() as f64
    }

    pub fn inlier_matches(&self) -> impl Iterator<Item = &Match> + '_ {
        self.matches
            .iter()
            .zip(&self.inlier_mask)
            .filter_map(|(m, &inlier)| inlier.then_some(m))
    }
}

/// SIFT + ratio test + RANSAC registration.
#[derive(Clone, Debug, Default)]
pub struct FeatureRegistrar {
    pub params: RegistrationParams,
}

impl FeatureRegistrar {
    pub fn new(params: RegistrationParams) -> Self {
        Self { params }
    }

    /// Register two color images (converted to grayscale).
    pub fn register(&self, src: &RgbImage, trg: &RgbImage) -> Result<Registration, RegistrationError> {
        let src_gray = src.to_gray();
        let trg_gray = trg.to_gray();
        self.register_gray(&src_gray.view(), &trg_gray.view())
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(src_w = src.width, trg_w = trg.width))
    )]
    pub fn register_gray(
        &self,
        src: &GrayImageView<'_>,
        trg: &GrayImageView<'_>,
    ) -> Result<Registration, RegistrationError> {
        let sift = Sift::new(self.params.sift.clone());
        let (src_keypoints, src_desc) = sift.detect_and_compute(src);
        let (trg_keypoints, trg_desc) = sift.detect_and_compute(trg);
        debug!(
            "keypoints: {} source, {} target",
            src_keypoints.len(),
            trg_keypoints.len()
        );

        let knn = knn2(&src_desc, &trg_desc);
        let matches = ratio_test(&knn, self.params.ratio);
        let required = self.params.min_matches.max(4);
        if matches.len() < required {
            warn!("only {} matches survived the ratio test", matches.len());
            return Err(RegistrationError::TooFewMatches {
                found: matches.len(),
                required,
            });
        }

        let pairs: Vec<Correspondence> = matches
            .iter()
            .map(|m| {
                (
                    src_keypoints[m.query_idx].position,
                    trg_keypoints[m.train_idx].position,
                )
            })
            .collect();

        let res = ransac::<HomographyEstimator>(&pairs, &self.params.ransac);
        let inlier_mask = res.inlier_mask(pairs.len());
        let homography = res.model.ok_or(RegistrationError::NoConsensus)?;

        info!(
            "registered with {}/{} inliers after {} iterations (rms {:.3} px)",
            res.inliers.len(),
            pairs.len(),
            res.iters,
            res.inlier_rms
        );

        Ok(Registration {
            homography,
            src_keypoints,
            trg_keypoints,
            matches,
            inlier_mask,
        })
    }
}

//! Feature-based image registration for disc-align.
//!
//! [`FeatureRegistrar`] estimates the homography taking one image onto
//! another:
//! 1. SIFT keypoints and descriptors on both grayscale images.
//! 2. Two nearest neighbours per source descriptor (exact L2 search).
//! 3. Ratio test (`nearest < 0.7 * second`).
//! 4. RANSAC over the surviving correspondences with a 4-point solver,
//!    followed by a DLT refit on the inliers.
//!
//! ## Quickstart
//!
//! ```
//! use disc_align_core::RgbImage;
//! use disc_align_features::{FeatureRegistrar, RegistrationError};
//!
//! let flat = RgbImage::from_fn(64, 64, |_, _| [90, 90, 90]);
//! let err = FeatureRegistrar::default().register(&flat, &flat).unwrap_err();
//! assert!(matches!(err, RegistrationError::TooFewMatches { found: 0, .. }));
//! ```

mod matching;
mod ransac;
mod registrar;
mod sift;

pub use matching::{knn2, ratio_test, Match};
pub use ransac::{
    ransac, Correspondence, Estimator, HomographyEstimator, RansacOptions, RansacResult,
};
pub use registrar::{FeatureRegistrar, Registration, RegistrationError, RegistrationParams};
pub use sift::{Descriptor, Keypoint, Sift, SiftParams, DESCRIPTOR_LEN};

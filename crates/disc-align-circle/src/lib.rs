//! Circle localization for disc-align.
//!
//! ## Quickstart
//!
//! ```
//! use disc_align_circle::{CircleLocator, LocateError, LocatorParams};
//! use disc_align_core::RgbImage;
//!
//! let blank = RgbImage::new(64, 64);
//! let locator = CircleLocator::new(LocatorParams::default());
//! assert!(matches!(locator.locate(&blank), Err(LocateError::NoCircles)));
//! ```
//!
//! Algorithm:
//! 1. Grayscale, 5x5 median blur.
//! 2. Canny edges (L1 Sobel magnitude, thresholds 50/100).
//! 3. Every edge pixel votes along its gradient, both ways, over the radius range.
//! 4. Accumulator local maxima above the vote threshold become center candidates,
//!    strongest first, suppressed within `min_dist` of an accepted circle.
//! 5. Each center gets the radius whose 1-px shell of edge distances has the best
//!    support-per-radius ratio.
//! 6. The largest circle (first one on ties) is cropped with a fixed margin.

mod edges;
mod hough;
mod locate;
mod median;
mod params;

pub use edges::{canny, sobel, Gradients};
pub use hough::{detect_circles, Circle};
pub use locate::{crop_circle, select_largest, CircleCrop, CircleLocator, LocateError};
pub use median::median_blur;
pub use params::{CropParams, HoughCircleParams, LocatorParams};

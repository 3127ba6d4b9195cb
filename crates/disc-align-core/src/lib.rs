//! Core types and utilities for disc-align.
//!
//! This crate is purely geometric/pixel-level. It does *not* depend on any
//! image codec: detectors and the pipeline exchange the small owned buffers
//! defined here ([`GrayImage`], [`RgbImage`], [`RgbaImage`]) and borrow them
//! through lightweight views.
//!
//! Pixel coordinates put the center of pixel `(i, j)` at `(i as f32, j as f32)`.
//! Keypoints, circles and homographies all use that convention.

mod composite;
mod homography;
mod image;
mod logger;
mod resize;
mod warp;

pub use composite::{make_transparent, overlay, CompositeError, TransparencyParams};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_clamped, sample_bilinear_color, ColorImage, ColorImageView,
    GrayImage, GrayImageView, ImageError, RgbImage, RgbaImage,
};
pub use resize::resize_bilinear;
pub use warp::{remap_perspective, warp_perspective, WarpError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;

//! Image decode/encode and the on-disk layout of a run directory.

use std::path::{Path, PathBuf};

use crate::core::{ImageError, RgbImage};
use crate::pipeline::PipelineError;

pub const USER_FILE: &str = "user.png";
pub const REFERENCE_FILE: &str = "real.png";
pub const LAYER_FILE: &str = "layer.png";
pub const CROPPED_FILE: &str = "cropped.png";
pub const STACKED_FILE: &str = "stacked.png";
pub const CIRCLES_FILE: &str = "detected-circles.png";
pub const MATCHES_FILE: &str = "detected-matches.png";

/// Files of one run, all inside `<root>/<id>/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunLayout {
    pub dir: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl AsRef<Path>, id: &str) -> Self {
        Self {
            dir: root.as_ref().join(id),
        }
    }

    pub fn user(&self) -> PathBuf {
        self.dir.join(USER_FILE)
    }

    pub fn reference(&self) -> PathBuf {
        self.dir.join(REFERENCE_FILE)
    }

    pub fn layer(&self) -> PathBuf {
        self.dir.join(LAYER_FILE)
    }

    pub fn cropped(&self) -> PathBuf {
        self.dir.join(CROPPED_FILE)
    }

    pub fn stacked(&self) -> PathBuf {
        self.dir.join(STACKED_FILE)
    }

    pub fn detected_circles(&self) -> PathBuf {
        self.dir.join(CIRCLES_FILE)
    }

    pub fn detected_matches(&self) -> PathBuf {
        self.dir.join(MATCHES_FILE)
    }
}

/// The three pipeline inputs, decoded.
#[derive(Clone, Debug)]
pub struct RunInputs {
    pub subject: RgbImage,
    pub reference: RgbImage,
    pub overlay: RgbImage,
}

impl RunInputs {
    pub fn load(layout: &RunLayout) -> Result<Self, PipelineError> {
        Ok(Self {
            subject: load_rgb(layout.user())?,
            reference: load_rgb(layout.reference())?,
            overlay: load_rgb(layout.layer())?,
        })
    }
}

pub fn from_image_rgb(img: &::image::RgbImage) -> Result<RgbImage, ImageError> {
    RgbImage::from_raw(
        img.width() as usize,
        img.height() as usize,
        img.as_raw().clone(),
    )
}

pub fn to_image_rgb(img: &RgbImage) -> Result<::image::RgbImage, ImageError> {
    ::image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone()).ok_or(
        ImageError::BufferLength {
            expected: img.width * img.height * 3,
            got: img.data.len(),
        },
    )
}

/// Decode any supported format, dropping alpha.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, PipelineError> {
    let path = path.as_ref();
    let decoded = ::image::open(path).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(from_image_rgb(&decoded.to_rgb8())?)
}

/// Encode with the format implied by the extension.
pub fn save_rgb(path: impl AsRef<Path>, img: &RgbImage) -> Result<(), PipelineError> {
    save_image(path, &to_image_rgb(img)?)
}

pub(crate) fn save_image(path: impl AsRef<Path>, img: &::image::RgbImage) -> Result<(), PipelineError> {
    let path = path.as_ref();
    img.save(path).map_err(|source| PipelineError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

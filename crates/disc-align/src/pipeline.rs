//! Locate, register, warp and composite, as an explicit stage sequence.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::circle::{CircleCrop, CircleLocator, LocateError, LocatorParams};
use crate::core::{
    make_transparent, overlay, remap_perspective, resize_bilinear, warp_perspective,
    CompositeError, Homography, ImageError, RgbImage, RgbaImage, TransparencyParams, WarpError,
};
use crate::features::{FeatureRegistrar, Registration, RegistrationError, RegistrationParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Locate,
    Resize,
    Register,
    Warp,
    Transparency,
    Composite,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Locate,
        Stage::Resize,
        Stage::Register,
        Stage::Warp,
        Stage::Transparency,
        Stage::Composite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Locate => "locate",
            Stage::Resize => "resize",
            Stage::Register => "register",
            Stage::Warp => "warp",
            Stage::Transparency => "transparency",
            Stage::Composite => "composite",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure taxonomy shared by every stage and outer surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Detection,
    Bounds,
    Registration,
    SingularTransform,
    DimensionMismatch,
    Io,
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Register(#[from] RegistrationError),

    #[error(transparent)]
    Warp(#[from] WarpError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error(transparent)]
    Buffer(#[from] ImageError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "image")]
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },

    #[cfg(feature = "image")]
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Stage that failed; `None` for I/O and configuration errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Locate(_) => Some(Stage::Locate),
            PipelineError::Register(_) => Some(Stage::Register),
            PipelineError::Warp(_) => Some(Stage::Warp),
            PipelineError::Composite(_) => Some(Stage::Composite),
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Locate(LocateError::NoCircles) => FailureKind::Detection,
            PipelineError::Locate(LocateError::CropOutOfBounds { .. }) => FailureKind::Bounds,
            PipelineError::Register(_) => FailureKind::Registration,
            PipelineError::Warp(_) => FailureKind::SingularTransform,
            PipelineError::Composite(_) | PipelineError::Buffer(_) => {
                FailureKind::DimensionMismatch
            }
            _ => FailureKind::Io,
        }
    }
}

/// Every tunable of the pipeline; missing JSON fields take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub locator: LocatorParams,
    pub registration: RegistrationParams,
    pub transparency: TransparencyParams,
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// Everything the pipeline produced, including intermediates for diagnostics.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub crop: CircleCrop,
    /// Reference resized to the crop.
    pub reference: RgbImage,
    pub registration: Registration,
    /// Crop warped into the reference frame.
    pub warped_subject: RgbImage,
    /// Overlay warped into the crop frame.
    pub warped_overlay: RgbImage,
    pub transparent_overlay: RgbaImage,
    pub stacked: RgbImage,
    pub timings: Vec<StageTiming>,
}

impl PipelineOutput {
    pub fn cropped(&self) -> &RgbImage {
        &self.crop.image
    }

    pub fn total_elapsed(&self) -> Duration {
        self.timings.iter().map(|t| t.elapsed).sum()
    }
}

fn timed<T, E>(
    timings: &mut Vec<StageTiming>,
    stage: Stage,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, PipelineError>
where
    PipelineError: From<E>,
{
    debug!("stage {stage}: start");
    let started = Instant::now();
    let out = f();
    let elapsed = started.elapsed();
    timings.push(StageTiming { stage, elapsed });
    match out {
        Ok(v) => {
            info!("stage {stage}: done in {:.1} ms", elapsed.as_secs_f64() * 1e3);
            Ok(v)
        }
        Err(e) => {
            let e = PipelineError::from(e);
            info!("stage {stage}: failed after {:.1} ms", elapsed.as_secs_f64() * 1e3);
            Err(e)
        }
    }
}

/// Aligns a subject photo to a reference and overlays a layer drawn on the
/// reference back onto the subject's crop.
#[derive(Clone, Debug, Default)]
pub struct OverlayPipeline {
    config: PipelineConfig,
    locator: CircleLocator,
    registrar: FeatureRegistrar,
}

impl OverlayPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            locator: CircleLocator::new(config.locator.clone()),
            registrar: FeatureRegistrar::new(config.registration.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn locate(&self, subject: &RgbImage) -> Result<CircleCrop, LocateError> {
        self.locator.locate(subject)
    }

    /// Bring reference and overlay to `size` (the crop's dimensions).
    pub fn resize(
        &self,
        reference: &RgbImage,
        overlay: &RgbImage,
        size: (usize, usize),
    ) -> (RgbImage, RgbImage) {
        (
            resize_bilinear(&reference.view(), size.0, size.1),
            resize_bilinear(&overlay.view(), size.0, size.1),
        )
    }

    /// Homography taking crop coordinates to reference coordinates.
    pub fn register(
        &self,
        crop: &RgbImage,
        reference: &RgbImage,
    ) -> Result<Registration, RegistrationError> {
        self.registrar.register(crop, reference)
    }

    /// Warp the crop forward with `h` and the overlay backward with `h^-1`.
    pub fn warp(
        &self,
        crop: &RgbImage,
        overlay: &RgbImage,
        h: &Homography,
    ) -> Result<(RgbImage, RgbImage), WarpError> {
        let warped_subject = warp_perspective(&crop.view(), h)?;
        // backward warp by h^-1 samples the overlay at h * p
        let warped_overlay = remap_perspective(&overlay.view(), h, crop.width, crop.height);
        Ok((warped_subject, warped_overlay))
    }

    pub fn transparency(&self, warped_overlay: &RgbImage) -> RgbaImage {
        make_transparent(warped_overlay, &self.config.transparency)
    }

    pub fn composite(&self, crop: &RgbImage, layer: &RgbaImage) -> Result<RgbImage, CompositeError> {
        overlay(crop, layer)
    }

    /// Run every stage in [`Stage::ALL`] order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(width = subject.width, height = subject.height))
    )]
    pub fn run(
        &self,
        subject: &RgbImage,
        reference: &RgbImage,
        overlay_layer: &RgbImage,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut timings = Vec::with_capacity(Stage::ALL.len());

        let crop = timed(&mut timings, Stage::Locate, || self.locate(subject))?;
        let size = crop.image.dimensions();

        let (reference, overlay_resized) = timed(&mut timings, Stage::Resize, || {
            Ok::<_, PipelineError>(self.resize(reference, overlay_layer, size))
        })?;

        let registration = timed(&mut timings, Stage::Register, || {
            self.register(&crop.image, &reference)
        })?;

        let (warped_subject, warped_overlay) = timed(&mut timings, Stage::Warp, || {
            self.warp(&crop.image, &overlay_resized, &registration.homography)
        })?;

        let transparent_overlay = timed(&mut timings, Stage::Transparency, || {
            Ok::<_, PipelineError>(self.transparency(&warped_overlay))
        })?;

        let stacked = timed(&mut timings, Stage::Composite, || {
            self.composite(&crop.image, &transparent_overlay)
        })?;

        Ok(PipelineOutput {
            crop,
            reference,
            registration,
            warped_subject,
            warped_overlay,
            transparent_overlay,
            stacked,
            timings,
        })
    }
}

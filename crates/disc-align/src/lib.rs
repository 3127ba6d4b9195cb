//! High-level facade for the `disc-align-*` workspace.
//!
//! Given a photo of a circular object (the subject), a canonical photo of the
//! same object (the reference) and an overlay drawn in the reference frame,
//! the pipeline crops the object out of the subject, registers the crop to the
//! reference and composites the overlay onto the crop in the right place.
//!
//! ## Quickstart
//!
//! ```no_run
//! use disc_align::io::{RunInputs, RunLayout};
//! use disc_align::{OverlayPipeline, PipelineConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = RunLayout::new("../Images", "1700000000");
//! let inputs = RunInputs::load(&layout)?;
//! let pipeline = OverlayPipeline::new(PipelineConfig::default());
//! let out = pipeline.run(&inputs.subject, &inputs.reference, &inputs.overlay)?;
//! disc_align::io::save_rgb(layout.stacked(), &out.stacked)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `disc_align::core`: image types, homographies, warping, resizing, compositing.
//! - `disc_align::circle`: Hough circle detection and cropping.
//! - `disc_align::features`: SIFT, matching, RANSAC registration.
//! - `disc_align::pipeline`: the stage sequence and its configuration.
//! - `disc_align::io`, `disc_align::diagnostics` (feature `image`): PNG I/O and debug renderings.

pub use disc_align_circle as circle;
pub use disc_align_core as core;
pub use disc_align_features as features;

pub mod pipeline;

#[cfg(feature = "image")]
pub mod diagnostics;
#[cfg(feature = "image")]
pub mod io;

pub use pipeline::{
    FailureKind, OverlayPipeline, PipelineConfig, PipelineError, PipelineOutput, Stage,
    StageTiming,
};

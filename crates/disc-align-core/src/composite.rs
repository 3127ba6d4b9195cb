//! Chroma-key style transparency and overlay compositing.
//!
//! Warping leaves black letterbox regions; [`make_transparent`] turns those
//! (and any other near-black pixel) fully transparent so [`overlay`] only
//! paints the annotation strokes onto the base image.

use crate::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    #[error("image dimensions differ (base {base_width}x{base_height}, layer {layer_width}x{layer_height})")]
    DimensionMismatch {
        base_width: usize,
        base_height: usize,
        layer_width: usize,
        layer_height: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparencyParams {
    /// A pixel is keyed out when every channel is `<= black_level`.
    pub black_level: u8,
}

impl Default for TransparencyParams {
    fn default() -> Self {
        Self { black_level: 5 }
    }
}

/// Add an alpha channel: 0 for near-black pixels, 255 for everything else.
pub fn make_transparent(src: &RgbImage, params: &TransparencyParams) -> RgbaImage {
    let level = params.black_level;
    let mut data = Vec::with_capacity(src.width * src.height * 4);
    for px in src.data.chunks_exact(3) {
        let keyed = px.iter().all(|&c| c <= level);
        data.extend_from_slice(px);
        data.push(if keyed { 0 } else { 255 });
    }
    RgbaImage {
        width: src.width,
        height: src.height,
        data,
    }
}

/// Paint every non-transparent `layer` pixel over a copy of `base`.
///
/// Any alpha other than 0 counts as opaque; the alpha value itself is dropped.
pub fn overlay(base: &RgbImage, layer: &RgbaImage) -> Result<RgbImage, CompositeError> {
    if base.dimensions() != layer.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            base_width: base.width,
            base_height: base.height,
            layer_width: layer.width,
            layer_height: layer.height,
        });
    }

    let mut out = base.clone();
    for (dst, src) in out.data.chunks_exact_mut(3).zip(layer.data.chunks_exact(4)) {
        if src[3] != 0 {
            dst.copy_from_slice(&src[..3]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_black_threshold_is_inclusive_at_five() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => [3, 2, 1],
            1 => [6, 0, 0],
            2 => [5, 5, 5],
            _ => [0, 0, 200],
        });
        let keyed = make_transparent(&img, &TransparencyParams::default());
        assert_eq!(keyed.pixel(0, 0), [3, 2, 1, 0]);
        assert_eq!(keyed.pixel(1, 0), [6, 0, 0, 255]);
        assert_eq!(keyed.pixel(2, 0), [5, 5, 5, 0]);
        assert_eq!(keyed.pixel(3, 0), [0, 0, 200, 255]);
    }

    #[test]
    fn overlay_respects_transparency() {
        let base = RgbImage::from_fn(2, 1, |_, _| [255, 0, 0]);
        let mut layer = RgbaImage::new(2, 1);
        layer.set_pixel(0, 0, [9, 9, 9, 0]);
        layer.set_pixel(1, 0, [0, 0, 255, 255]);

        let out = overlay(&base, &layer).expect("same size");
        assert_eq!(out.pixel(0, 0), [255, 0, 0]);
        assert_eq!(out.pixel(1, 0), [0, 0, 255]);
    }

    #[test]
    fn partial_alpha_counts_as_opaque() {
        let base = RgbImage::new(1, 1);
        let layer = RgbaImage::from_raw(1, 1, vec![10, 20, 30, 1]).expect("sized");
        assert_eq!(overlay(&base, &layer).expect("same size").pixel(0, 0), [10, 20, 30]);
    }

    #[test]
    fn overlay_rejects_mismatched_sizes() {
        let base = RgbImage::new(3, 2);
        let layer = RgbaImage::new(2, 3);
        assert_eq!(
            overlay(&base, &layer),
            Err(CompositeError::DimensionMismatch {
                base_width: 3,
                base_height: 2,
                layer_width: 2,
                layer_height: 3,
            })
        );
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let p: TransparencyParams = serde_json::from_str("{}").expect("json");
        assert_eq!(p.black_level, 5);
    }
}

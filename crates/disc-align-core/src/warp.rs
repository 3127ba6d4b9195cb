use crate::{sample_bilinear_color, ColorImage, ColorImageView, Homography};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WarpError {
    #[error("homography is singular and cannot be inverted (det={det:e})")]
    Singular { det: f64 },
}

/// Warp `src` into the frame reached by `h_dst_from_src`, keeping its size.
///
/// Output pixel `p` is sampled from `src` at `H^-1 * p`; samples falling
/// outside `src` stay black.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, h_dst_from_src), fields(width = src.width, height = src.height))
)]
pub fn warp_perspective<const C: usize>(
    src: &ColorImageView<'_, C>,
    h_dst_from_src: &Homography,
) -> Result<ColorImage<C>, WarpError> {
    let h_src_from_dst = h_dst_from_src.inverse().ok_or(WarpError::Singular {
        det: h_dst_from_src.determinant(),
    })?;
    Ok(remap_perspective(
        src,
        &h_src_from_dst,
        src.width,
        src.height,
    ))
}

/// Fill an `out_w x out_h` image: for each dst pixel, map to src via
/// `h_src_from_dst` and sample bilinearly.
///
/// Integer pixel coordinates are mapped as-is (pixel centers sit on integers).
pub fn remap_perspective<const C: usize>(
    src: &ColorImageView<'_, C>,
    h_src_from_dst: &Homography,
    out_w: usize,
    out_h: usize,
) -> ColorImage<C> {
    let mut out = ColorImage::<C>::new(out_w, out_h);
    if out_w == 0 {
        return out;
    }

    for (y, row) in out.data.chunks_exact_mut(out_w * C).enumerate() {
        for (x, px) in row.chunks_exact_mut(C).enumerate() {
            let ps = h_src_from_dst.apply(Point2::new(x as f32, y as f32));
            if !ps.x.is_finite() || !ps.y.is_finite() {
                continue;
            }
            if let Some(v) = sample_bilinear_color(src, ps.x, ps.y) {
                for (dst, val) in px.iter_mut().zip(v) {
                    *dst = val.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    out
}

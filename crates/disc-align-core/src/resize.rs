use crate::{ColorImage, ColorImageView};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Bilinear resize with half-pixel centers and replicated borders.
///
/// Resizing to the source size returns an exact copy.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src), fields(src_w = src.width, src_h = src.height))
)]
pub fn resize_bilinear<const C: usize>(
    src: &ColorImageView<'_, C>,
    out_w: usize,
    out_h: usize,
) -> ColorImage<C> {
    if (out_w, out_h) == (src.width, src.height) {
        return ColorImage {
            width: out_w,
            height: out_h,
            data: src.data.to_vec(),
        };
    }
    let mut out = ColorImage::<C>::new(out_w, out_h);
    if src.width == 0 || src.height == 0 || out_w == 0 || out_h == 0 {
        return out;
    }

    let scale_x = src.width as f32 / out_w as f32;
    let scale_y = src.height as f32 / out_h as f32;
    let xs: Vec<(usize, usize, f32)> = (0..out_w)
        .map(|x| source_taps(x, scale_x, src.width))
        .collect();

    for (y, row) in out.data.chunks_exact_mut(out_w * C).enumerate() {
        let (y0, y1, fy) = source_taps(y, scale_y, src.height);
        for (px, &(x0, x1, fx)) in row.chunks_exact_mut(C).zip(&xs) {
            let p00 = src.pixel(x0, y0);
            let p10 = src.pixel(x1, y0);
            let p01 = src.pixel(x0, y1);
            let p11 = src.pixel(x1, y1);
            for c in 0..C {
                let a = p00[c] as f32 + fx * (p10[c] as f32 - p00[c] as f32);
                let b = p01[c] as f32 + fx * (p11[c] as f32 - p01[c] as f32);
                px[c] = (a + fy * (b - a)).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Source pixel pair and weight for destination index `d`.
fn source_taps(d: usize, scale: f32, len: usize) -> (usize, usize, f32) {
    let s = ((d as f32 + 0.5) * scale - 0.5).clamp(0.0, (len - 1) as f32);
    let s0 = s.floor() as usize;
    let s1 = (s0 + 1).min(len - 1);
    (s0, s1, s - s0 as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RgbImage;

    #[test]
    fn same_size_resize_is_a_copy() {
        let img = RgbImage::from_fn(5, 4, |x, y| [x as u8 * 40, y as u8 * 60, 3]);
        assert_eq!(resize_bilinear(&img.view(), 5, 4), img);
    }

    #[test]
    fn downscale_by_two_averages_blocks() {
        let img = ColorImage::<1>::from_fn(4, 2, |x, _| [if x < 2 { 10 } else { 30 }]);
        let out = resize_bilinear(&img.view(), 2, 1);
        assert_eq!(out.data, vec![10, 30]);
    }

    #[test]
    fn upscale_interpolates_between_pixels() {
        let img = ColorImage::<1>::from_fn(2, 1, |x, _| [if x == 0 { 0 } else { 100 }]);
        let out = resize_bilinear(&img.view(), 4, 1);
        // centers map to -0.25, 0.25, 0.75, 1.25 in the source
        assert_eq!(out.data, vec![0, 25, 75, 100]);
    }
}

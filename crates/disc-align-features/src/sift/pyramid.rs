//! Gaussian and difference-of-Gaussian scale space.

use disc_align_core::GrayImageView;

/// Single-channel `f32` image, row-major.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_gray(src: &GrayImageView<'_>) -> Self {
        Self {
            width: src.width,
            height: src.height,
            data: src.data.iter().map(|&v| v as f32).collect(),
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Double the size with half-pixel-center bilinear interpolation.
    pub fn upsample2x(&self) -> Self {
        let (w, h) = (self.width, self.height);
        let mut out = Self::new(w * 2, h * 2);
        if w == 0 || h == 0 {
            return out;
        }
        for oy in 0..h * 2 {
            let sy = ((oy as f32 + 0.5) * 0.5 - 0.5).max(0.0);
            let y0 = (sy.floor() as usize).min(h - 1);
            let y1 = (y0 + 1).min(h - 1);
            let fy = sy - y0 as f32;
            for ox in 0..w * 2 {
                let sx = ((ox as f32 + 0.5) * 0.5 - 0.5).max(0.0);
                let x0 = (sx.floor() as usize).min(w - 1);
                let x1 = (x0 + 1).min(w - 1);
                let fx = sx - x0 as f32;
                let top = self.at(x0, y0) + fx * (self.at(x1, y0) - self.at(x0, y0));
                let bot = self.at(x0, y1) + fx * (self.at(x1, y1) - self.at(x0, y1));
                out.data[oy * w * 2 + ox] = top + fy * (bot - top);
            }
        }
        out
    }

    /// Keep every second pixel in both directions.
    pub fn downsample_half(&self) -> Self {
        let (w, h) = (self.width / 2, self.height / 2);
        let mut out = Self::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.data[y * w + x] = self.at(2 * x, 2 * y);
            }
        }
        out
    }

    pub fn subtract(&self, other: &Self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a - b)
                .collect(),
        }
    }

    /// Separable Gaussian blur with mirrored (reflect-101) borders.
    pub fn gaussian_blur(&self, sigma: f32) -> Self {
        let kernel = gaussian_kernel(sigma);
        let r = (kernel.len() / 2) as isize;
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return self.clone();
        }

        let mut tmp = Self::new(w, h);
        for y in 0..h {
            let row = &self.data[y * w..(y + 1) * w];
            for x in 0..w {
                let mut acc = 0.0;
                for (k, &kv) in kernel.iter().enumerate() {
                    let xx = reflect101(x as isize + k as isize - r, w as isize);
                    acc += kv * row[xx];
                }
                tmp.data[y * w + x] = acc;
            }
        }

        let mut out = Self::new(w, h);
        for y in 0..h {
            for (k, &kv) in kernel.iter().enumerate() {
                let yy = reflect101(y as isize + k as isize - r, h as isize);
                let src = &tmp.data[yy * w..(yy + 1) * w];
                let dst = &mut out.data[y * w..(y + 1) * w];
                for (d, s) in dst.iter_mut().zip(src) {
                    *d += kv * s;
                }
            }
        }
        out
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let ksize = (((sigma * 8.0 + 1.0).round() as usize) | 1).max(1);
    let half = (ksize / 2) as f32;
    let scale = -0.5 / (sigma * sigma);
    let mut k: Vec<f32> = (0..ksize)
        .map(|i| {
            let d = i as f32 - half;
            (d * d * scale).exp()
        })
        .collect();
    let sum: f32 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= sum);
    k
}

#[inline]
fn reflect101(i: isize, n: isize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Gaussian images (`layers + 3` per octave) and their differences
/// (`layers + 2` per octave).
pub(crate) struct ScaleSpace {
    pub gaussians: Vec<Vec<FloatImage>>,
    pub dogs: Vec<Vec<FloatImage>>,
    pub layers: usize,
}

impl ScaleSpace {
    /// `base` must already be blurred to `sigma`.
    pub fn build(base: FloatImage, n_octaves: usize, layers: usize, sigma: f32) -> Self {
        let per_octave = layers + 3;
        let k = 2f32.powf(1.0 / layers as f32);

        // incremental blur taking layer i-1 to layer i
        let mut sig = vec![sigma; per_octave];
        for (i, s) in sig.iter_mut().enumerate().skip(1) {
            let prev = k.powi(i as i32 - 1) * sigma;
            let total = prev * k;
            *s = (total * total - prev * prev).sqrt();
        }

        let mut gaussians: Vec<Vec<FloatImage>> = Vec::with_capacity(n_octaves);
        let mut next_base = Some(base);
        for _ in 0..n_octaves {
            let Some(first) = next_base.take() else {
                break;
            };
            let mut octave = Vec::with_capacity(per_octave);
            octave.push(first);
            for s in &sig[1..] {
                let blurred = octave[octave.len() - 1].gaussian_blur(*s);
                octave.push(blurred);
            }
            next_base = Some(octave[layers].downsample_half());
            gaussians.push(octave);
        }

        let dogs = gaussians
            .iter()
            .map(|octave| octave.windows(2).map(|w| w[1].subtract(&w[0])).collect())
            .collect();

        Self {
            gaussians,
            dogs,
            layers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(1.6);
        assert_eq!(k.len(), 15);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((k[0] - k[14]).abs() < 1e-7);
    }

    #[test]
    fn blur_preserves_constant_images() {
        let img = FloatImage {
            width: 7,
            height: 5,
            data: vec![42.0; 35],
        };
        let out = img.gaussian_blur(2.0);
        assert!(out.data.iter().all(|v| (v - 42.0).abs() < 1e-3));
    }

    #[test]
    fn upsample_keeps_flat_and_interpolates_ramp() {
        let img = FloatImage {
            width: 2,
            height: 1,
            data: vec![0.0, 100.0],
        };
        let up = img.upsample2x();
        assert_eq!((up.width, up.height), (4, 2));
        assert_eq!(&up.data[..4], &[0.0, 25.0, 75.0, 100.0]);
    }

    #[test]
    fn scale_space_has_expected_shape() {
        let base = FloatImage::new(32, 24);
        let ss = ScaleSpace::build(base, 2, 3, 1.6);
        assert_eq!(ss.gaussians.len(), 2);
        assert_eq!(ss.gaussians[0].len(), 6);
        assert_eq!(ss.dogs[0].len(), 5);
        assert_eq!((ss.gaussians[1][0].width, ss.gaussians[1][0].height), (16, 12));
    }
}

/// Errors raised when wrapping raw pixel buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid pixel buffer length (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error(
        "region {width}x{height} at ({x}, {y}) exceeds image bounds {image_width}x{image_height}"
    )]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        image_width: usize,
        image_height: usize,
    },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        check_len(width, height, 1, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn to_owned(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Interleaved 8-bit image with `C` channels per pixel.
///
/// `C = 3` is opaque color, `C = 4` carries transparency in the last channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorImage<const C: usize> {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>, // row-major, len = w*h*C
}

pub type RgbImage = ColorImage<3>;
pub type RgbaImage = ColorImage<4>;

#[derive(Clone, Copy, Debug)]
pub struct ColorImageView<'a, const C: usize> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl<const C: usize> ColorImage<C> {
    /// All-zero (black, and fully transparent for `C = 4`) image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * C],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        check_len(width, height, C, data.len())?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [u8; C]) -> Self {
        let mut data = Vec::with_capacity(width * height * C);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> ColorImageView<'_, C> {
        ColorImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; C] {
        let i = (y * self.width + x) * C;
        let mut px = [0u8; C];
        px.copy_from_slice(&self.data[i..i + C]);
        px
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, px: [u8; C]) {
        let i = (y * self.width + x) * C;
        self.data[i..i + C].copy_from_slice(&px);
    }

    /// Rows of the image as `width * C` byte slices.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact((self.width * C).max(1))
    }

    /// Copy out the `width x height` region whose top-left pixel is `(x, y)`.
    pub fn sub_image(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<Self, ImageError> {
        if x + width > self.width || y + height > self.height {
            return Err(ImageError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                image_width: self.width,
                image_height: self.height,
            });
        }
        let mut data = Vec::with_capacity(width * height * C);
        for row in self.rows().skip(y).take(height) {
            data.extend_from_slice(&row[x * C..(x + width) * C]);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

impl RgbImage {
    /// Luma conversion with the ITU-R BT.601 weights, rounded to nearest.
    pub fn to_gray(&self) -> GrayImage {
        let data = self
            .data
            .chunks_exact(3)
            .map(|px| {
                let y = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                y.round().clamp(0.0, 255.0) as u8
            })
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

impl<const C: usize> ColorImageView<'_, C> {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; C] {
        let i = (y * self.width + x) * C;
        let mut px = [0u8; C];
        px.copy_from_slice(&self.data[i..i + C]);
        px
    }
}

fn check_len(width: usize, height: usize, channels: usize, got: usize) -> Result<(), ImageError> {
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .unwrap_or(usize::MAX);
    if expected != got {
        return Err(ImageError::BufferLength { expected, got });
    }
    Ok(())
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample; samples outside the image read as zero.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Bilinear sample with coordinates clamped to the image (replicated border).
#[inline]
pub fn sample_bilinear_clamped(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    if src.width == 0 || src.height == 0 {
        return 0.0;
    }
    let max_x = (src.width - 1) as f32;
    let max_y = (src.height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get(x0, y0) as f32;
    let p10 = src.get(x1, y0) as f32;
    let p01 = src.get(x0, y1) as f32;
    let p11 = src.get(x1, y1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Per-channel bilinear sample; taps outside the image read as zero.
///
/// Returns `None` when the sample lies entirely outside the image, so callers
/// can skip the write and leave the destination black.
#[inline]
pub fn sample_bilinear_color<const C: usize>(
    src: &ColorImageView<'_, C>,
    x: f32,
    y: f32,
) -> Option<[f32; C]> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let (w, h) = (src.width as i64, src.height as i64);
    if x0 < -1 || y0 < -1 || x0 >= w || y0 >= h {
        return None;
    }
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut out = [0.0f32; C];
    for (tx, ty, wt) in taps {
        if tx < 0 || ty < 0 || tx >= w || ty >= h || wt == 0.0 {
            continue;
        }
        let i = (ty as usize * src.width + tx as usize) * C;
        for (c, v) in out.iter_mut().enumerate() {
            *v += wt * src.data[i + c] as f32;
        }
    }
    Some(out)
}

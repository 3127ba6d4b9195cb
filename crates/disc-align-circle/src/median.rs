use disc_align_core::{GrayImage, GrayImageView};

/// Square median filter with replicated borders.
///
/// `kernel` must be odd; `kernel <= 1` returns a copy.
pub fn median_blur(src: &GrayImageView<'_>, kernel: usize) -> GrayImage {
    if kernel <= 1 || src.width == 0 || src.height == 0 {
        return src.to_owned();
    }
    let r = (kernel / 2) as isize;
    let (w, h) = (src.width as isize, src.height as isize);
    let mid = (kernel * kernel) / 2;

    let mut window = Vec::with_capacity(kernel * kernel);
    let mut out = GrayImage::new(src.width, src.height);

    for y in 0..h {
        for x in 0..w {
            window.clear();
            for dy in -r..=r {
                let yy = (y + dy).clamp(0, h - 1) as usize;
                let row = &src.data[yy * src.width..(yy + 1) * src.width];
                for dx in -r..=r {
                    window.push(row[(x + dx).clamp(0, w - 1) as usize]);
                }
            }
            let (_, m, _) = window.select_nth_unstable(mid);
            out.data[y as usize * src.width + x as usize] = *m;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_isolated_speckle() {
        let mut img = GrayImage::new(9, 9);
        img.data[4 * 9 + 4] = 255;
        img.data[0] = 255;
        let out = median_blur(&img.view(), 5);
        assert!(out.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn keeps_straight_edges() {
        let img = GrayImage::from_raw(
            8,
            6,
            (0..48).map(|i| if i % 8 < 4 { 0 } else { 200 }).collect(),
        )
        .expect("sized");
        let out = median_blur(&img.view(), 5);
        assert_eq!(out, img);
    }
}

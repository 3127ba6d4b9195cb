#![allow(dead_code)]

use disc_align::core::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SUBJECT_SIZE: usize = 200;
pub const DISC_CENTER: f32 = 100.0;
pub const DISC_RADIUS: f32 = 60.0;
pub const CROP_SIZE: usize = 160;

/// Gray disc carrying smooth blobs of both polarities, on black.
///
/// Blobs are wide enough to stay below the Canny thresholds so the disc rim
/// is the only strong edge.
pub fn textured_disc(w: usize, h: usize, cx: f32, cy: f32, r: f32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut blobs = Vec::new();
    while blobs.len() < 30 {
        let bx = rng.random_range(cx - r..cx + r);
        let by = rng.random_range(cy - r..cy + r);
        if (bx - cx).hypot(by - cy) > r - 12.0 {
            continue;
        }
        let sigma = rng.random_range(3.5..5.5);
        let amp = if rng.random_bool(0.5) { 40.0 } else { -40.0 };
        blobs.push((bx, by, sigma, amp));
    }

    RgbImage::from_fn(w, h, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        if (fx - cx).hypot(fy - cy) > r {
            return [0, 0, 0];
        }
        let v = blobs
            .iter()
            .map(|&(bx, by, s, amp): &(f32, f32, f32, f32)| {
                let d2 = (fx - bx).powi(2) + (fy - by).powi(2);
                amp * (-d2 / (2.0 * s * s)).exp()
            })
            .sum::<f32>()
            + 140.0;
        let g = v.round().clamp(0.0, 255.0) as u8;
        [g, g, (g / 2).saturating_add(40)]
    })
}

/// Subject photo: one textured disc centered in a black frame.
pub fn subject() -> RgbImage {
    textured_disc(
        SUBJECT_SIZE,
        SUBJECT_SIZE,
        DISC_CENTER,
        DISC_CENTER,
        DISC_RADIUS,
        7,
    )
}

/// Reference: the subject's disc seen head-on, framed like a default crop.
pub fn reference() -> RgbImage {
    let offset = (SUBJECT_SIZE - CROP_SIZE) / 2;
    subject()
        .sub_image(offset, offset, CROP_SIZE, CROP_SIZE)
        .expect("crop inside subject")
}

/// Annotation layer: a red bar and a green box on black.
pub fn overlay_layer() -> RgbImage {
    RgbImage::from_fn(CROP_SIZE, CROP_SIZE, |x, y| {
        if (50..110).contains(&x) && (76..84).contains(&y) {
            [255, 0, 0]
        } else if (40..120).contains(&x) && (y == 40 || y == 119) {
            [0, 255, 0]
        } else {
            [0, 0, 0]
        }
    })
}

pub fn is_red(px: [u8; 3]) -> bool {
    px[0] > 150 && px[1] < 80 && px[2] < 80
}

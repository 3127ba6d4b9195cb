//! Debug renderings of the detected circles and the inlier matches.

use ::image::{imageops, Rgb};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::circle::Circle;
use crate::core::{ImageError, RgbImage};
use crate::features::Registration;
use crate::io::{save_image, to_image_rgb, RunLayout};
use crate::pipeline::{PipelineError, PipelineOutput};

const RING: Rgb<u8> = Rgb([255, 0, 255]);
const CENTER: Rgb<u8> = Rgb([100, 100, 0]);
const RING_THICKNESS: i32 = 3;

/// Line colors for match pairs, cycled by match index.
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 64, 64]),
    Rgb([64, 255, 64]),
    Rgb([64, 160, 255]),
    Rgb([255, 200, 0]),
    Rgb([0, 230, 230]),
    Rgb([255, 128, 255]),
];

/// Every detected circle as a magenta ring with a small center dot.
pub fn draw_circles(img: &RgbImage, circles: &[Circle]) -> Result<::image::RgbImage, ImageError> {
    let mut canvas = to_image_rgb(img)?;
    for c in circles {
        let center = (c.center.x.round() as i32, c.center.y.round() as i32);
        let r = c.radius.round() as i32;
        for dr in -(RING_THICKNESS / 2)..=RING_THICKNESS / 2 {
            if r + dr > 0 {
                draw_hollow_circle_mut(&mut canvas, center, r + dr, RING);
            }
        }
        draw_filled_circle_mut(&mut canvas, center, 2, CENTER);
    }
    Ok(canvas)
}

/// Source and target side by side with every inlier match joined by a line.
pub fn draw_matches(
    src: &RgbImage,
    trg: &RgbImage,
    registration: &Registration,
) -> Result<::image::RgbImage, ImageError> {
    let left = to_image_rgb(src)?;
    let right = to_image_rgb(trg)?;
    let width = left.width() + right.width();
    let height = left.height().max(right.height());

    let mut canvas = ::image::RgbImage::new(width, height);
    imageops::replace(&mut canvas, &left, 0, 0);
    imageops::replace(&mut canvas, &right, left.width() as i64, 0);

    let offset = left.width() as f32;
    for (i, m) in registration.inlier_matches().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let a = registration.src_keypoints[m.query_idx].position;
        let b = registration.trg_keypoints[m.train_idx].position;
        draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x + offset, b.y), color);
        draw_hollow_circle_mut(&mut canvas, (a.x.round() as i32, a.y.round() as i32), 3, color);
        draw_hollow_circle_mut(
            &mut canvas,
            ((b.x + offset).round() as i32, b.y.round() as i32),
            3,
            color,
        );
    }
    Ok(canvas)
}

/// Write `detected-circles.png` (on the subject) and `detected-matches.png`.
pub fn write_diagnostics(
    layout: &RunLayout,
    subject: &RgbImage,
    output: &PipelineOutput,
) -> Result<(), PipelineError> {
    save_image(
        layout.detected_circles(),
        &draw_circles(subject, &output.crop.circles)?,
    )?;
    save_image(
        layout.detected_matches(),
        &draw_matches(output.cropped(), &output.reference, &output.registration)?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Homography;
    use crate::features::{Keypoint, Match};
    use nalgebra::Point2;

    fn keypoint(x: f32, y: f32) -> Keypoint {
        Keypoint {
            position: Point2::new(x, y),
            size: 4.0,
            angle: 0.0,
            response: 0.1,
            octave: 0,
            layer: 1,
        }
    }

    #[test]
    fn circles_are_drawn_in_magenta() {
        let img = RgbImage::new(40, 40);
        let circle = Circle {
            center: Point2::new(20.0, 20.0),
            radius: 10.0,
            votes: 50,
        };
        let out = draw_circles(&img, &[circle]).expect("sized");
        assert_eq!(*out.get_pixel(30, 20), RING);
        assert_eq!(*out.get_pixel(20, 20), CENTER);
        assert_eq!(*out.get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn matches_canvas_is_side_by_side() {
        let src = RgbImage::from_fn(20, 10, |_, _| [10, 10, 10]);
        let trg = RgbImage::from_fn(15, 12, |_, _| [200, 200, 200]);
        let reg = Registration {
            homography: Homography::identity(),
            src_keypoints: vec![keypoint(5.0, 5.0)],
            trg_keypoints: vec![keypoint(7.0, 6.0)],
            matches: vec![Match {
                query_idx: 0,
                train_idx: 0,
                distance: 0.0,
            }],
            inlier_mask: vec![true],
        };
        let out = draw_matches(&src, &trg, &reg).expect("sized");
        assert_eq!(out.dimensions(), (35, 12));
        assert_eq!(*out.get_pixel(0, 11), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(34, 0), Rgb([200, 200, 200]));
        assert_eq!(*out.get_pixel(5, 5), PALETTE[0]);
    }
}

use disc_align_core::RgbImage;
use log::{debug, info};

use crate::hough::{detect_circles, Circle};
use crate::params::LocatorParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("no circles detected")]
    NoCircles,
    #[error("crop [{x0}, {x1}) x [{y0}, {y1}) exceeds image {width}x{height}")]
    CropOutOfBounds {
        circle: Circle,
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        width: usize,
        height: usize,
    },
}

/// Cropped disc plus the detection it was cut around.
#[derive(Clone, Debug)]
pub struct CircleCrop {
    pub image: RgbImage,
    /// The circle that was cropped (largest radius).
    pub circle: Circle,
    /// Every accepted detection, for diagnostics.
    pub circles: Vec<Circle>,
    /// Top-left corner of the crop in source pixels.
    pub origin: (usize, usize),
}

/// Index of the circle with the largest radius; the first one wins ties.
pub fn select_largest(circles: &[Circle]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in circles.iter().enumerate() {
        match best {
            Some(b) if c.radius <= circles[b].radius => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Square crop of side `2r + 2 * margin` centered on the circle.
///
/// Center and radius are rounded to whole pixels first. Returns the crop and
/// its top-left corner in `img`.
pub fn crop_circle(
    img: &RgbImage,
    circle: &Circle,
    margin: u32,
) -> Result<(RgbImage, (usize, usize)), LocateError> {
    let cx = circle.center.x.round() as i64;
    let cy = circle.center.y.round() as i64;
    let r = circle.radius.round() as i64;
    let m = margin as i64;

    let (x0, y0) = (cx - r - m, cy - r - m);
    let (x1, y1) = (cx + r + m, cy + r + m);

    let out_of_bounds = x0 < 0 || y0 < 0 || x1 > img.width as i64 || y1 > img.height as i64;
    if out_of_bounds || x1 <= x0 || y1 <= y0 {
        return Err(LocateError::CropOutOfBounds {
            circle: *circle,
            x0,
            y0,
            x1,
            y1,
            width: img.width,
            height: img.height,
        });
    }

    let (x, y) = (x0 as usize, y0 as usize);
    let side = (x1 - x0) as usize;
    let crop = img
        .sub_image(x, y, side, side)
        .map_err(|_| LocateError::CropOutOfBounds {
            circle: *circle,
            x0,
            y0,
            x1,
            y1,
            width: img.width,
            height: img.height,
        })?;
    Ok((crop, (x, y)))
}

/// Finds the dominant circle in a color image and crops around it.
#[derive(Clone, Debug, Default)]
pub struct CircleLocator {
    pub params: LocatorParams,
}

impl CircleLocator {
    pub fn new(params: LocatorParams) -> Self {
        Self { params }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn locate(&self, img: &RgbImage) -> Result<CircleCrop, LocateError> {
        let gray = img.to_gray();
        let circles = detect_circles(&gray.view(), &self.params.hough);
        for c in &circles {
            debug!(
                "circle at ({:.1}, {:.1}) r={:.1} votes={}",
                c.center.x, c.center.y, c.radius, c.votes
            );
        }

        let best = select_largest(&circles).ok_or(LocateError::NoCircles)?;
        let circle = circles[best];
        let (image, origin) = crop_circle(img, &circle, self.params.crop.margin)?;

        info!(
            "located circle ({:.1}, {:.1}) r={:.1} of {}; crop {}x{} at {:?}",
            circle.center.x,
            circle.center.y,
            circle.radius,
            circles.len(),
            image.width,
            image.height,
            origin
        );

        Ok(CircleCrop {
            image,
            circle,
            circles,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn circle(x: f32, y: f32, r: f32) -> Circle {
        Circle {
            center: Point2::new(x, y),
            radius: r,
            votes: 100,
        }
    }

    #[test]
    fn largest_radius_wins_and_ties_keep_first() {
        let cs = [circle(10.0, 10.0, 5.0), circle(30.0, 30.0, 9.0), circle(50.0, 50.0, 9.0)];
        assert_eq!(select_largest(&cs), Some(1));
        assert_eq!(select_largest(&[]), None);
    }

    #[test]
    fn crop_has_margin_on_every_side() {
        let img = RgbImage::from_fn(100, 80, |x, y| [x as u8, y as u8, 0]);
        let (crop, origin) = crop_circle(&img, &circle(50.4, 40.0, 10.0), 5).expect("inside");
        assert_eq!(origin, (35, 25));
        assert_eq!(crop.dimensions(), (30, 30));
        assert_eq!(crop.pixel(0, 0), [35, 25, 0]);
        assert_eq!(crop.pixel(29, 29), [64, 54, 0]);
    }

    #[test]
    fn crop_touching_the_edge_is_allowed() {
        let img = RgbImage::new(40, 40);
        let (crop, origin) = crop_circle(&img, &circle(20.0, 20.0, 15.0), 5).expect("fits");
        assert_eq!(origin, (0, 0));
        assert_eq!(crop.dimensions(), (40, 40));
    }

    #[test]
    fn crop_past_the_edge_fails() {
        let img = RgbImage::new(40, 40);
        let err = crop_circle(&img, &circle(10.0, 20.0, 15.0), 5).unwrap_err();
        match err {
            LocateError::CropOutOfBounds { x0, x1, .. } => {
                assert_eq!(x0, -10);
                assert_eq!(x1, 30);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn blank_image_reports_no_circles() {
        let locator = CircleLocator::default();
        let err = locator.locate(&RgbImage::new(64, 64)).unwrap_err();
        assert_eq!(err, LocateError::NoCircles);
    }
}

use approx::assert_abs_diff_eq;
use disc_align_core::{Homography, RgbImage};
use disc_align_features::{
    FeatureRegistrar, RansacOptions, RegistrationError, RegistrationParams,
};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random Gaussian blobs of varying size and polarity on a mid-gray field.
fn blob_field(w: usize, h: usize, n: usize, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let blobs: Vec<(f32, f32, f32, f32)> = (0..n)
        .map(|_| {
            (
                rng.random_range(8.0..w as f32 - 8.0),
                rng.random_range(8.0..h as f32 - 8.0),
                rng.random_range(1.5..4.0),
                if rng.random_bool(0.5) { 90.0 } else { -90.0 },
            )
        })
        .collect();

    RgbImage::from_fn(w, h, |x, y| {
        let v: f32 = blobs
            .iter()
            .map(|&(cx, cy, s, amp)| {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                amp * (-d2 / (2.0 * s * s)).exp()
            })
            .sum::<f32>()
            + 128.0;
        let g = v.round().clamp(0.0, 255.0) as u8;
        [g, g, g]
    })
}

fn seeded() -> RegistrationParams {
    RegistrationParams {
        ransac: RansacOptions {
            seed: Some(11),
            ..RansacOptions::default()
        },
        ..RegistrationParams::default()
    }
}

#[test]
fn identical_images_register_to_identity() {
    let img = blob_field(128, 128, 40, 3);
    let reg = FeatureRegistrar::new(seeded())
        .register(&img, &img)
        .expect("registration");

    assert!(reg.matches.len() >= 10, "{}", reg.matches.len());
    assert!(reg.inlier_ratio() > 0.9, "{}", reg.inlier_ratio());
    assert_eq!(reg.inlier_mask.len(), reg.matches.len());

    for p in [(10.0, 10.0), (64.0, 64.0), (120.0, 20.0), (30.0, 110.0)] {
        let q = reg.homography.apply(Point2::new(p.0, p.1));
        assert_abs_diff_eq!(q.x, p.0, epsilon = 0.5);
        assert_abs_diff_eq!(q.y, p.1, epsilon = 0.5);
    }
}

#[test]
fn shifted_image_registers_to_translation() {
    let big = blob_field(150, 150, 55, 5);
    let (dx, dy) = (7usize, 4usize);
    let src = big.sub_image(0, 0, 128, 128).expect("inside");
    let trg = big.sub_image(dx, dy, 128, 128).expect("inside");

    let reg = FeatureRegistrar::new(seeded())
        .register(&src, &trg)
        .expect("registration");

    // a source point at (x, y) shows up in the target at (x - dx, y - dy)
    let expected = Homography::from_array([
        [1.0, 0.0, -(dx as f64)],
        [0.0, 1.0, -(dy as f64)],
        [0.0, 0.0, 1.0],
    ]);
    for p in [(30.0, 30.0), (64.0, 64.0), (100.0, 90.0)] {
        let got = reg.homography.apply(Point2::new(p.0, p.1));
        let want = expected.apply(Point2::new(p.0, p.1));
        assert_abs_diff_eq!(got.x, want.x, epsilon = 1.0);
        assert_abs_diff_eq!(got.y, want.y, epsilon = 1.0);
    }
    assert!(reg.inlier_matches().count() >= 8);
}

#[test]
fn featureless_image_reports_too_few_matches() {
    let flat = RgbImage::from_fn(96, 96, |_, _| [120, 120, 120]);
    let err = FeatureRegistrar::default()
        .register(&flat, &flat)
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::TooFewMatches {
            found: 0,
            required: 4
        }
    );
}

#[test]
fn params_load_from_partial_json() {
    let params: RegistrationParams =
        serde_json::from_str(r#"{ "ratio": 0.8, "ransac": { "seed": 9 } }"#).expect("json");
    assert_eq!(params.ratio, 0.8);
    assert_eq!(params.ransac.seed, Some(9));
    assert_eq!(params.ransac.thresh, 3.0);
    assert_eq!(params.sift.n_octave_layers, 3);
}

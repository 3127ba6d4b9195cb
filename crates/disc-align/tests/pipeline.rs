mod common;

use approx::assert_abs_diff_eq;
use common::{is_red, overlay_layer, reference, subject, CROP_SIZE, DISC_RADIUS};
use disc_align::core::RgbImage;
use disc_align::features::RansacOptions;
use disc_align::{OverlayPipeline, PipelineConfig, Stage};
use nalgebra::Point2;

fn seeded_pipeline() -> OverlayPipeline {
    let mut config = PipelineConfig::default();
    config.registration.ransac = RansacOptions {
        seed: Some(5),
        ..RansacOptions::default()
    };
    OverlayPipeline::new(config)
}

#[test]
fn stacks_overlay_onto_the_cropped_disc() {
    let subject = subject();
    let out = seeded_pipeline()
        .run(&subject, &reference(), &overlay_layer())
        .expect("pipeline");

    // crop is an exact copy of the subject region
    let (ox, oy) = out.crop.origin;
    let (w, h) = out.cropped().dimensions();
    assert!(w.abs_diff(CROP_SIZE) <= 4 && h.abs_diff(CROP_SIZE) <= 4, "{w}x{h}");
    assert_eq!(*out.cropped(), subject.sub_image(ox, oy, w, h).expect("inside"));
    assert!((out.crop.circle.radius - DISC_RADIUS).abs() <= 2.0);

    assert_eq!(out.reference.dimensions(), (w, h));
    assert_eq!(out.stacked.dimensions(), (w, h));
    assert_eq!(out.transparent_overlay.dimensions(), (w, h));

    let timed: Vec<Stage> = out.timings.iter().map(|t| t.stage).collect();
    assert_eq!(timed, Stage::ALL);

    let reg = &out.registration;
    assert!(reg.inlier_count() >= 8, "{} inliers", reg.inlier_count());
    assert!(reg.inlier_ratio() > 0.5, "{}", reg.inlier_ratio());
    let center = Point2::new(w as f32 / 2.0, h as f32 / 2.0);
    assert_abs_diff_eq!(reg.homography.apply(center), center, epsilon = 3.0);

    // keyed-out pixels leave the crop untouched, the rest come from the layer
    let mut red = 0;
    for y in 0..h {
        for x in 0..w {
            let layer = out.transparent_overlay.pixel(x, y);
            let stacked = out.stacked.pixel(x, y);
            if layer[3] == 0 {
                assert_eq!(stacked, out.cropped().pixel(x, y));
            } else {
                assert_eq!(stacked, [layer[0], layer[1], layer[2]]);
            }
            if is_red(stacked) {
                red += 1;
            }
        }
    }
    assert!(red >= 300, "{red} red pixels");
}

#[test]
fn identical_inputs_stack_onto_their_own_crop() {
    let s = subject();
    let out = seeded_pipeline().run(&s, &s, &s).expect("pipeline");

    let (ox, oy) = out.crop.origin;
    let (w, h) = out.cropped().dimensions();
    assert_eq!(*out.cropped(), s.sub_image(ox, oy, w, h).expect("inside"));
    assert_eq!(out.stacked.dimensions(), (w, h));

    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let mut total = 0u64;
    let mut n = 0u64;
    for y in 0..h {
        for x in 0..w {
            let crop = out.cropped().pixel(x, y);
            let stacked = out.stacked.pixel(x, y);
            let warped = out.warped_overlay.pixel(x, y);
            if warped.iter().all(|&c| c <= 5) {
                assert_eq!(stacked, crop, "near-black overlay changed ({x}, {y})");
                continue;
            }
            assert_eq!(stacked, warped);
            if (x as f32 - cx).hypot(y as f32 - cy) <= 40.0 {
                total += crop.iter().zip(&stacked).map(|(&p, &q)| p.abs_diff(q) as u64).sum::<u64>();
                n += 3;
            }
        }
    }
    assert!(n > 0);
    let mean = total as f64 / n as f64;
    assert!(mean <= 8.0, "mean abs difference {mean}");
}

#[test]
fn warped_subject_lines_up_with_reference() {
    let out = seeded_pipeline()
        .run(&subject(), &reference(), &overlay_layer())
        .expect("pipeline");

    let (w, h) = out.reference.dimensions();
    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    let mut total = 0u64;
    let mut n = 0u64;
    for y in 0..h {
        for x in 0..w {
            if (x as f32 - cx).hypot(y as f32 - cy) > 40.0 {
                continue;
            }
            let a = out.warped_subject.pixel(x, y);
            let b = out.reference.pixel(x, y);
            total += a.iter().zip(&b).map(|(&p, &q)| p.abs_diff(q) as u64).sum::<u64>();
            n += 3;
        }
    }
    let mean = total as f64 / n as f64;
    assert!(mean <= 8.0, "mean abs difference {mean}");
}

#[test]
fn stages_can_run_one_by_one() {
    let pipeline = seeded_pipeline();
    let crop = pipeline.locate(&subject()).expect("locate");
    let size = crop.image.dimensions();

    let (reference, layer) = pipeline.resize(&reference(), &overlay_layer(), size);
    assert_eq!(reference.dimensions(), size);
    assert_eq!(layer.dimensions(), size);

    let reg = pipeline.register(&crop.image, &reference).expect("register");
    let (warped_subject, warped_overlay) = pipeline
        .warp(&crop.image, &layer, &reg.homography)
        .expect("warp");
    assert_eq!(warped_subject.dimensions(), size);

    let keyed = pipeline.transparency(&warped_overlay);
    let stacked = pipeline.composite(&crop.image, &keyed).expect("composite");
    assert_eq!(stacked.dimensions(), size);

    let wrong = RgbImage::new(size.0 + 1, size.1);
    assert!(pipeline.composite(&wrong, &keyed).is_err());
}

#[test]
fn featureless_disc_fails_at_register() {
    let flat = RgbImage::from_fn(200, 200, |x, y| {
        if (x as f32 - 100.0).hypot(y as f32 - 100.0) <= 60.0 {
            [140, 140, 110]
        } else {
            [0, 0, 0]
        }
    });
    let blank_reference = RgbImage::from_fn(CROP_SIZE, CROP_SIZE, |_, _| [140, 140, 110]);
    let err = seeded_pipeline()
        .run(&flat, &blank_reference, &overlay_layer())
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Register), "{err}");
}

mod common;

use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

use disc_align::io::{save_rgb, RunLayout};

fn disc_align() -> Command {
    Command::new(env!("CARGO_BIN_EXE_disc-align"))
}

fn write_run(root: &Path, id: &str) -> RunLayout {
    let layout = RunLayout::new(root, id);
    std::fs::create_dir_all(&layout.dir).expect("run dir");
    save_rgb(layout.user(), &common::subject()).expect("user.png");
    save_rgb(layout.reference(), &common::reference()).expect("real.png");
    save_rgb(layout.layer(), &common::overlay_layer()).expect("layer.png");
    layout
}

#[test]
fn writes_crop_stack_and_diagnostics() {
    let root = tempfile::tempdir().expect("tempdir");
    let layout = write_run(root.path(), "1700000000");

    disc_align()
        .arg("1700000000")
        .arg("--images-root")
        .arg(root.path())
        .args(["--seed", "3", "--log-level", "warn"])
        .assert()
        .success();

    for path in [
        layout.cropped(),
        layout.stacked(),
        layout.detected_circles(),
        layout.detected_matches(),
    ] {
        assert!(path.is_file(), "missing {}", path.display());
    }
    let stacked = disc_align::io::load_rgb(layout.stacked()).expect("decode");
    let cropped = disc_align::io::load_rgb(layout.cropped()).expect("decode");
    assert_eq!(stacked.dimensions(), cropped.dimensions());
}

#[test]
fn diagnostics_can_be_skipped() {
    let root = tempfile::tempdir().expect("tempdir");
    let layout = write_run(root.path(), "run");

    disc_align()
        .args(["run", "--no-diagnostics", "--seed", "3"])
        .arg("--images-root")
        .arg(root.path())
        .assert()
        .success();

    assert!(layout.stacked().is_file());
    assert!(!layout.detected_circles().exists());
    assert!(!layout.detected_matches().exists());
}

#[test]
fn missing_run_directory_reports_the_input() {
    let root = tempfile::tempdir().expect("tempdir");

    disc_align()
        .arg("nope")
        .arg("--images-root")
        .arg(root.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("user.png"));
}

#[test]
fn invalid_config_is_rejected() {
    let root = tempfile::tempdir().expect("tempdir");
    write_run(root.path(), "run");
    let config = root.path().join("config.json");
    std::fs::write(&config, "{ \"locator\": 3 }").expect("config");

    disc_align()
        .arg("run")
        .arg("--images-root")
        .arg(root.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn partial_config_overrides_crop_margin() {
    let root = tempfile::tempdir().expect("tempdir");
    let layout = write_run(root.path(), "run");
    let config = root.path().join("config.json");
    std::fs::write(&config, r#"{ "locator": { "crop": { "margin": 10 } } }"#).expect("config");

    disc_align()
        .arg("run")
        .arg("--images-root")
        .arg(root.path())
        .arg("--config")
        .arg(&config)
        .args(["--seed", "3", "--no-diagnostics"])
        .assert()
        .success();

    let cropped = disc_align::io::load_rgb(layout.cropped()).expect("decode");
    let (w, _) = cropped.dimensions();
    assert!(w.abs_diff(140) <= 4, "crop width {w}");
}

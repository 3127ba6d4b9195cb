//! disc-align CLI: crop, register and composite one run directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{info, LevelFilter};

use disc_align::diagnostics::write_diagnostics;
use disc_align::io::{save_rgb, RunInputs, RunLayout};
use disc_align::{OverlayPipeline, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "disc-align")]
#[command(about = "Align a photo of a circular object to its reference and overlay a layer")]
#[command(version)]
struct Cli {
    /// Run identifier: the directory under the images root holding
    /// user.png, real.png and layer.png.
    id: String,

    /// Directory containing the run directories.
    #[arg(long, default_value = "../Images")]
    images_root: PathBuf,

    /// JSON pipeline configuration; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed RANSAC for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Skip detected-circles.png and detected-matches.png.
    #[arg(long)]
    no_diagnostics: bool,

    /// off, error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Emit tracing spans as JSON instead of the plain logger.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    log_json: bool,
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    disc_align::core::init_tracing(cli.log_json, cli.log_level);
    #[cfg(not(feature = "tracing"))]
    if let Err(err) = disc_align::core::init_with_level(cli.log_level) {
        eprintln!("logger already installed: {err}");
    }
}

fn run(cli: &Cli) -> Result<(), PipelineError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.registration.ransac.seed = Some(seed);
    }

    let layout = RunLayout::new(&cli.images_root, &cli.id);
    info!("run directory {}", layout.dir.display());
    let inputs = RunInputs::load(&layout)?;

    let pipeline = OverlayPipeline::new(config);
    let out = pipeline.run(&inputs.subject, &inputs.reference, &inputs.overlay)?;

    save_rgb(layout.cropped(), out.cropped())?;
    save_rgb(layout.stacked(), &out.stacked)?;
    if !cli.no_diagnostics {
        write_diagnostics(&layout, &inputs.subject, &out)?;
    }

    info!(
        "done in {:.1} ms ({} of {} matches are inliers)",
        out.total_elapsed().as_secs_f64() * 1e3,
        out.registration.inlier_count(),
        out.registration.matches.len()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.stage() {
                Some(stage) => eprintln!("error in stage {stage} ({:?}): {err}", err.kind()),
                None => eprintln!("error ({:?}): {err}", err.kind()),
            }
            ExitCode::FAILURE
        }
    }
}

//! Headless fisheye viewer
//!
//! Opens an image or an image-sequence directory, applies a projection and
//! optionally plays a number of frames, then saves snapshots and/or prints
//! the engine status.
//!
//! Usage:
//! ```bash
//! RUST_LOG=info cargo run --bin fisheye-view -- frames/ \
//!   --camera-type kb --calibration samples/kannala_brandt.yaml \
//!   --mode anypoint --alpha 40 --beta 90 --play 30 --output output/
//! ```

use std::path::PathBuf;

use clap::Parser;
use fisheye_view_engine::{
    AnypointPreset, CameraType, SourceSpec, TickStatus, ViewEngine, ViewMode, ViewerConfig,
};
use log::{info, warn};

/// Fisheye view and playback tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Image file, directory of frames, or `camera:<device>`
    input: String,

    /// Calibration model type (ds, eucm, kb)
    #[arg(long, requires = "calibration")]
    camera_type: Option<CameraType>,

    /// Path to the calibration YAML file
    #[arg(long, requires = "camera_type")]
    calibration: Option<String>,

    /// Projection: fisheye, anypoint or panorama
    #[arg(short, long, default_value = "fisheye")]
    mode: ViewMode,

    /// Anypoint sub-mode (1 or 2)
    #[arg(long)]
    submode: Option<u8>,

    #[arg(long, allow_hyphen_values = true)]
    alpha: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    beta: Option<f64>,

    /// Roll, anypoint sub-mode 2 only
    #[arg(long, allow_hyphen_values = true)]
    roll: Option<f64>,

    #[arg(long)]
    zoom: Option<f64>,

    #[arg(long)]
    alpha_min: Option<f64>,

    #[arg(long)]
    alpha_max: Option<f64>,

    /// Anypoint direction preset (center, up, left, right, down)
    #[arg(long)]
    preset: Option<AnypointPreset>,

    /// Number of frames to play after opening, one per configured tick interval
    #[arg(long, default_value = "0")]
    play: usize,

    /// Directory to save result and original snapshots to
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Viewer configuration YAML
    #[arg(short, long)]
    config: Option<String>,

    /// Print the engine status as JSON
    #[arg(long)]
    status_json: bool,
}

fn source_spec(input: &str) -> SourceSpec {
    match input.strip_prefix("camera:") {
        Some(device) => SourceSpec::Camera(device.to_string()),
        None => SourceSpec::File(PathBuf::from(input)),
    }
}

fn apply_projection(engine: &mut ViewEngine, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(submode) = cli.submode {
        engine.set_anypoint_submode(submode)?;
    }
    if let Some(preset) = cli.preset {
        engine.apply_anypoint_preset(preset)?;
    }

    let anypoint = engine.projection().anypoint.clone();
    if cli.alpha.is_some() || cli.beta.is_some() || cli.roll.is_some() || cli.zoom.is_some() {
        engine.set_anypoint_params(
            cli.alpha.unwrap_or(anypoint.alpha),
            cli.beta.unwrap_or(anypoint.beta),
            cli.roll.unwrap_or(anypoint.roll),
            cli.zoom.unwrap_or(anypoint.zoom),
        )?;
    }

    let panorama = engine.projection().panorama.clone();
    if cli.alpha_min.is_some() || cli.alpha_max.is_some() {
        engine.set_panorama_params(
            cli.alpha_min.unwrap_or(panorama.alpha_min),
            cli.alpha_max.unwrap_or(panorama.alpha_max),
        )?;
    }

    engine.set_mode(cli.mode)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ViewerConfig::load_from_yaml(path)?,
        None => ViewerConfig::default(),
    };
    let mut engine = ViewEngine::with_file_backend(config);

    if let (Some(camera_type), Some(path)) = (cli.camera_type, &cli.calibration) {
        engine.select_camera_type(camera_type, path)?;
    }
    engine.open_source(source_spec(&cli.input))?;
    apply_projection(&mut engine, &cli)?;

    if cli.play > 0 {
        if engine.play() {
            let interval = engine.config().tick_interval();
            let mut played = 0;
            while played < cli.play {
                if played > 0 {
                    std::thread::sleep(interval);
                }
                match engine.tick() {
                    Ok(TickStatus::Advanced) => played += 1,
                    Ok(TickStatus::Finished) => {
                        played += 1;
                        info!("Reached the end of the stream");
                        break;
                    }
                    Ok(TickStatus::Idle) => break,
                    Err(err) if !err.is_fatal() => {
                        warn!("Playback stopped: {err}");
                        break;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            engine.pause();
            info!(
                "Played {played} frames, now at {} / {}",
                engine.current_time_text(),
                engine.total_time_text()
            );
        } else {
            warn!("Source cannot be played");
        }
    }

    if let Some(dir) = &cli.output {
        let (result, original) = engine.save_snapshot(dir)?;
        info!(
            "Saved {} and {}",
            result.display(),
            original.display()
        );
    }

    if cli.status_json {
        println!("{}", serde_json::to_string_pretty(&engine.status())?);
    }

    Ok(())
}

//! Command-line driver for the dental face scan capture core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dental_face_scan::config::{Config, EXAMPLE_CONFIG};
use dental_face_scan::detection::{Detection, FixedDetector};
use dental_face_scan::quality::SharpnessEvaluator;
use dental_face_scan::reconstruction::{ExternalCommandEngine, ReconstructionController, ReconstructionEvent};
use dental_face_scan::session::ScanSession;
use dental_face_scan::simulation::{self, OrbitSweep};
use dental_face_scan::storage::{stage_photogrammetry_input, BackgroundWriter, StillStorage};
use dental_face_scan::types::{CaptureBucket, CaptureMode, PlanningMode};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a synthetic orbit sweep through the capture pipeline
    Simulate {
        /// Bucket to capture into
        #[arg(short, long, default_value = "repose", value_parser = parse_bucket)]
        bucket: CaptureBucket,

        /// Number of frames in the sweep
        #[arg(short, long, default_value = "600")]
        frames: usize,

        /// Use full-arch planning (120 stills) instead of esthetic (80)
        #[arg(long)]
        full_arch: bool,

        /// Disable automatic capture
        #[arg(long)]
        manual: bool,
    },

    /// Copy a bucket's stills into the photogrammetry input folder
    Stage {
        /// Bucket to stage
        #[arg(short, long, default_value = "repose", value_parser = parse_bucket)]
        bucket: CaptureBucket,
    },

    /// Stage a bucket and run an external photogrammetry command on it
    Reconstruct {
        /// Bucket to reconstruct
        #[arg(short, long, default_value = "repose", value_parser = parse_bucket)]
        bucket: CaptureBucket,

        /// Program to run; receives the input folder and output path
        #[arg(long)]
        engine_cmd: PathBuf,

        /// Extra arguments passed before the input folder
        #[arg(last = true)]
        engine_args: Vec<String>,
    },

    /// Write an example configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "scan.yaml")]
        path: PathBuf,
    },
}

fn parse_bucket(name: &str) -> std::result::Result<CaptureBucket, String> {
    CaptureBucket::parse(name).ok_or_else(|| {
        let known: Vec<&str> = CaptureBucket::ALL.iter().map(|b| b.as_str()).collect();
        format!("unknown bucket '{name}' (expected one of: {})", known.join(", "))
    })
}

fn load_config(path: Option<&PathBuf>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    info!("Loading configuration from: {}", path.display());
    match Config::from_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("Failed to load config file: {}. Using defaults.", e);
            Config::default()
        }
    }
}

fn simulate(config: &Config, bucket: CaptureBucket, frames: usize, full_arch: bool, manual: bool) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let _guard = runtime.enter();

    let sweep = OrbitSweep {
        frames,
        ..OrbitSweep::default()
    };
    let store = Arc::new(config.image_store());
    let writer = if config.storage.background_writes {
        Some(Arc::new(BackgroundWriter::spawn(Arc::clone(&store))?))
    } else {
        None
    };
    let storage: Arc<dyn StillStorage> = match &writer {
        Some(writer) => Arc::clone(writer) as Arc<dyn StillStorage>,
        None => store as Arc<dyn StillStorage>,
    };

    let detector = FixedDetector::new(Some(Detection::new(sweep.face_box(), 0.9)));
    let mut session = ScanSession::new(
        config.session_settings(),
        Box::new(detector),
        Box::new(SharpnessEvaluator::default()),
        storage,
    );
    session.set_bucket(bucket);
    session.set_preview_mode(config.capture.preview_mode);
    session.set_capture_mode(if manual { CaptureMode::Manual } else { config.capture.mode });
    session.set_planning_mode(if full_arch { PlanningMode::FullArch } else { config.capture.planning_mode });

    session.start();
    let report = simulation::run(&mut session, &sweep);
    drop(session);

    if let Some(writer) = writer {
        match Arc::try_unwrap(writer) {
            Ok(writer) => {
                let written = runtime.block_on(writer.finish())?;
                info!("Background writer flushed {} stills", written);
            }
            Err(_) => log::warn!("Background writer still shared; pending writes may be lost"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn stage(config: &Config, bucket: CaptureBucket) -> Result<()> {
    let store = config.image_store();
    let settings = config.reconstruction_settings();
    let staged = stage_photogrammetry_input(&store, bucket, settings.max_samples, settings.min_images)
        .with_context(|| format!("Failed to stage {bucket}"))?;
    println!(
        "Staged {} images in {} (output: {})",
        staged.images.len(),
        staged.folder.display(),
        staged.output.display()
    );
    Ok(())
}

fn reconstruct(config: &Config, bucket: CaptureBucket, program: PathBuf, args: Vec<String>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let _guard = runtime.enter();

    let store = config.image_store();
    let engine = ExternalCommandEngine::new(program, args);
    let mut controller = ReconstructionController::new(Arc::new(engine), config.reconstruction_settings());
    controller.start(&store, bucket)?;
    println!("{}", controller.status_text());

    runtime.block_on(async {
        while let Some(event) = controller.next_event().await {
            println!("{}", controller.status_text());
            if event.is_terminal() {
                if let ReconstructionEvent::Failed(message) = event {
                    anyhow::bail!("Reconstruction failed: {message}");
                }
                break;
            }
        }
        Ok(())
    })?;

    if let Some(model) = controller.model_path() {
        println!("Model: {}", model.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Dental Face Scan");

    let config = load_config(args.config.as_ref());
    config.validate()?;

    match args.command {
        Command::Simulate {
            bucket,
            frames,
            full_arch,
            manual,
        } => simulate(&config, bucket, frames, full_arch, manual),
        Command::Stage { bucket } => stage(&config, bucket),
        Command::Reconstruct {
            bucket,
            engine_cmd,
            engine_args,
        } => reconstruct(&config, bucket, engine_cmd, engine_args),
        Command::InitConfig { path } => {
            std::fs::write(&path, EXAMPLE_CONFIG)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote example configuration to {}", path.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_argument_parsing() {
        assert_eq!(parse_bucket("teeth-macro"), Ok(CaptureBucket::TeethMacro));
        assert_eq!(parse_bucket("Smile"), Ok(CaptureBucket::Smile));
        assert!(parse_bucket("frown").unwrap_err().contains("repose"));
    }

    #[test]
    fn test_subcommand_parsing() {
        let args = Args::try_parse_from(["dental-face-scan", "--debug", "simulate", "--frames", "120", "--full-arch"])
            .unwrap();
        assert!(args.debug);
        match args.command {
            Command::Simulate {
                bucket,
                frames,
                full_arch,
                manual,
            } => {
                assert_eq!(bucket, CaptureBucket::Repose);
                assert_eq!(frames, 120);
                assert!(full_arch);
                assert!(!manual);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_reconstruct_passes_trailing_args() {
        let args = Args::try_parse_from([
            "dental-face-scan",
            "reconstruct",
            "--engine-cmd",
            "/usr/bin/photogrammetry",
            "--",
            "--detail",
            "full",
        ])
        .unwrap();
        let Command::Reconstruct { engine_args, .. } = args.command else {
            panic!("expected reconstruct");
        };
        assert_eq!(engine_args, vec!["--detail".to_string(), "full".to_string()]);
    }
}

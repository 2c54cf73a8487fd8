//! # VISOR Inspection Runtime Binary
//!
//! Per-frame decision fusion and PLC actuation dispatch for industrial
//! sorting lines.
//!
//! # Usage
//!
//! ```bash
//! # Run fully simulated (no camera, no model, no controller)
//! visor_inspect --config config/visor.toml --simulate
//!
//! # Run against the configured backends
//! visor_inspect --config config/visor.toml
//!
//! # Verbose logging / JSON logs
//! visor_inspect -s -v
//! visor_inspect --json
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;
use visor_common::config::ConfigLoader;
use visor_common::consts::DEFAULT_CONFIG_PATH;
use visor_inspect::camera::FrameSource;
use visor_inspect::config::InspectionConfig;
use visor_inspect::detect::Detector;
use visor_inspect::evidence::{EvidenceWriter, FsEvidenceStore};
use visor_inspect::runner::InspectionCore;
use visor_inspect::sim::{SimCamera, SimDetector};
use visor_plc::{create_transport, PlcLink, PlcTransport, SimTransport};

/// VISOR Inspection Runtime - decision fusion and actuation dispatch
#[derive(Parser, Debug)]
#[command(name = "visor_inspect")]
#[command(version)]
#[command(about = "Vision inspection loop: camera → detector → PLC data block")]
struct Args {
    /// Path to the station configuration TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force simulation backends for camera, detector and PLC transport.
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("startup failed: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("VISOR Inspection Runtime v{} starting...", env!("CARGO_PKG_VERSION"));

    // Configuration inconsistencies (missing codes, bad addressing) halt
    // startup here; per-frame operational errors never do.
    let config = InspectionConfig::load(&args.config)?;
    config.validate()?;
    info!(
        station = %config.shared.station_name,
        classes = config.policy.priority.len(),
        plc = %config.plc.endpoint(),
        "configuration loaded from {}",
        args.config.display()
    );

    let camera = build_camera(&config, args.simulate)?;
    let detector = build_detector(&config, args.simulate)?;

    let transport: Box<dyn PlcTransport> = if args.simulate {
        info!("simulation mode: PLC writes go to the sim transport");
        Box::new(SimTransport::new().0)
    } else {
        create_transport(&config.plc)?
    };
    let link = PlcLink::new(&config.plc, transport);

    let writer = if config.evidence.labels.is_empty() {
        info!("evidence capture disabled (no labels configured)");
        None
    } else {
        std::fs::create_dir_all(&config.evidence.dir)?;
        info!(
            dir = %config.evidence.dir.display(),
            labels = ?config.evidence.labels,
            "evidence capture enabled"
        );
        Some(EvidenceWriter::spawn(
            Box::new(FsEvidenceStore),
            config.shared.station_name.clone(),
            config.evidence.queue_depth,
        ))
    };

    let mut core = InspectionCore::new(&config, camera, detector, link, writer);

    // Setup signal handler for graceful shutdown.
    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.run();
    core.shutdown();

    info!("VISOR Inspection Runtime shutdown complete");
    Ok(())
}

/// Resolve the configured frame source.
fn build_camera(
    config: &InspectionConfig,
    simulate: bool,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if simulate {
        return Ok(Box::new(SimCamera::bench_default()));
    }
    match config.camera.source.as_str() {
        "sim" => Ok(Box::new(SimCamera::bench_default())),
        other => Err(format!(
            "unknown camera source '{other}' (SDK-backed sources are wired by the integration layer)"
        )
        .into()),
    }
}

/// Resolve the configured detector backend.
fn build_detector(
    config: &InspectionConfig,
    simulate: bool,
) -> Result<Box<dyn Detector>, Box<dyn std::error::Error>> {
    let threshold = config.detector.confidence_threshold;
    if simulate {
        return Ok(Box::new(SimDetector::new(threshold)));
    }
    match config.detector.backend.as_str() {
        "sim" => Ok(Box::new(SimDetector::new(threshold))),
        other => Err(format!(
            "unknown detector backend '{other}' (model-backed detectors are wired by the integration layer)"
        )
        .into()),
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

// src/bin/handpose_tools.rs
//! Command-line front end for recording simulation and offline post-processing

use handpose_core::acquisition::{Recorder, RecorderCommand};
use handpose_core::config::{ConfigLoader, SystemConfig};
use handpose_core::hal::{SimulatedHand, SimulatedRenderer, SimulatedWatch};
use handpose_core::offline::{
    compare_labels, merge_files, preprocess_file, read_labels, AnnotationExporter,
    GestureClassMap, SegmentSmoother,
};
use handpose_core::offline::annotation::{load_template, ActionLabelSet};
use handpose_core::pose::{LibraryStore, LibraryWatcher, PoseLibrary};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

const USAGE: &str = "\
usage: handpose-tools <command> [args]

commands:
  preprocess <poses.csv>                              smooth labels into action_annotations.csv
  annotate <labels.csv> [label-set.json] [template.json]
                                                      export action annotations as JSON
  align <labels.csv> <out.csv> <sensor.csv>...        merge label and sensor files
  compare <reference.csv> <predicted.csv>             score predicted labels
  simulate <library.json> <seconds>                   record a simulated session
  --version                                           print the version";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = dispatch(&args).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(args: &[String]) -> CliResult {
    let Some((command, rest)) = args.split_first() else {
        println!("{}\n\n{}", handpose_core::version_info(), USAGE);
        return Ok(());
    };

    match command.as_str() {
        "help" | "--help" | "-h" => {
            println!("{}\n\n{}", handpose_core::version_info(), USAGE);
            return Ok(());
        }
        "--version" | "-V" => {
            println!("{} {}", handpose_core::NAME, handpose_core::VERSION);
            return Ok(());
        }
        _ => {}
    }

    let config = ConfigLoader::new().load_system_config()?;
    match (command.as_str(), rest) {
        ("preprocess", [input]) => preprocess(&config, Path::new(input)),
        ("annotate", [input, options @ ..]) if options.len() <= 2 => {
            annotate(&config, Path::new(input), options.first(), options.get(1))
        }
        ("align", [labels, output, sensors @ ..]) if !sensors.is_empty() => {
            align(Path::new(labels), Path::new(output), sensors)
        }
        ("compare", [reference, predicted]) => compare(Path::new(reference), Path::new(predicted)),
        ("simulate", [library, seconds]) => simulate(config, Path::new(library), seconds.parse()?).await,
        _ => Err(format!("invalid arguments\n\n{}", USAGE).into()),
    }
}

fn preprocess(config: &SystemConfig, input: &Path) -> CliResult {
    let smoother = SegmentSmoother::from_config(&config.smoothing);
    let output = preprocess_file(input, &smoother)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn annotate(
    config: &SystemConfig,
    input: &Path,
    label_set: Option<&String>,
    template: Option<&String>,
) -> CliResult {
    let mut exporter = match label_set {
        Some(path) => AnnotationExporter::new(ActionLabelSet::load(path)?).with_object(config.annotation.object_id),
        None => AnnotationExporter::from_config(&config.annotation)?,
    };
    if let Some(path) = template {
        exporter = exporter.with_template(load_template(path)?);
    }

    let samples = read_labels(input)?;
    let output = input.with_extension("json");
    let annotations = exporter.export(&samples, &output)?;
    println!("Wrote {} annotations to {}", annotations.len(), output.display());
    Ok(())
}

fn align(labels: &Path, output: &Path, sensors: &[String]) -> CliResult {
    let summary = merge_files(labels, sensors, output, &GestureClassMap::default())?;
    println!(
        "Merged {} rows with {} columns into {}",
        summary.rows,
        summary.columns.len(),
        output.display()
    );
    Ok(())
}

fn compare(reference: &Path, predicted: &Path) -> CliResult {
    let report = compare_labels(&read_labels(reference)?, &read_labels(predicted)?)?;
    print!("{}", report);
    Ok(())
}

async fn simulate(config: SystemConfig, library_path: &Path, seconds: f64) -> CliResult {
    let library = PoseLibrary::load(library_path)?;
    info!(poses = library.len(), path = %library_path.display(), "reference library loaded");

    let hand = SimulatedHand::new(&library, config.recording.target_fps.max(1) * 2);
    let store = LibraryStore::new(library);
    let _watcher = if config.classifier.watch_library {
        Some(LibraryWatcher::spawn(library_path, store.clone())?)
    } else {
        None
    };

    let recorder = Recorder::new(hand, store, &config)
        .with_connector(Arc::new(SimulatedWatch::new()))
        .with_renderer(Box::new(SimulatedRenderer::new(160, 64)));
    let (commands, rx) = mpsc::channel(16);
    let running = tokio::spawn(recorder.run(rx));

    commands.send(RecorderCommand::ConnectTelemetry).await?;
    commands.send(RecorderCommand::Start).await?;
    tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
    commands.send(RecorderCommand::Stop).await?;
    commands.send(RecorderCommand::Shutdown).await?;

    let summary = running.await??;
    println!(
        "Frames: {} seen, {} rejected; {} poses and {} telemetry samples recorded",
        summary.frames_seen, summary.frames_rejected, summary.poses_recorded, summary.telemetry_recorded
    );
    for report in &summary.recordings {
        if !report.is_complete() {
            warn!(path = %report.directory.display(), "recording is incomplete");
        }
        println!("Recording {}: {} files", report.directory.display(), report.written.len());
    }
    Ok(())
}

//! ActSeq command line entry point
//!
//! Runs one session per observation file against a preset and prints the
//! session reports as JSON.

use actseq_rs::{
    config::{default_config_path, EngineConfig, LoggingSettings},
    observation::RawObservation,
    preset::{Preset, PresetDefinition},
    session::{SessionJob, SessionPool, SessionReport},
};
use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "actseq-rs")]
#[command(about = "Segment per-frame detections and replay them through a preset workflow")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "ACTSEQ_CONFIG")]
    config: Option<PathBuf>,

    /// Preset id from the config file
    #[arg(short, long, conflicts_with = "preset_file")]
    preset: Option<String>,

    /// Preset definition JSON file
    #[arg(long)]
    preset_file: Option<PathBuf>,

    /// Write the reports here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Observation files, one session each
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

/// Install stderr logging, plus a rolling file when a log directory is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    match &settings.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

fn select_preset(args: &Args, config: &EngineConfig) -> anyhow::Result<Arc<Preset>> {
    if let Some(path) = &args.preset_file {
        let def = PresetDefinition::load_json(path)?;
        let preset = Preset::load(&def)
            .with_context(|| format!("preset file {:?} is invalid", path))?;
        return Ok(Arc::new(preset));
    }

    let registry = config.registry();
    for (id, err) in registry.rejected() {
        tracing::warn!("Preset '{}' unavailable: {}", id, err);
    }

    match &args.preset {
        Some(id) => registry
            .get(id)
            .with_context(|| format!("no valid preset '{}' (have: {:?})", id, registry.ids())),
        None if registry.len() == 1 => registry
            .ids()
            .first()
            .and_then(|id| registry.get(id))
            .context("preset registry is empty"),
        None => bail!(
            "choose a preset with --preset (have: {:?})",
            registry.ids()
        ),
    }
}

fn read_observations(path: &Path) -> anyhow::Result<Vec<RawObservation>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {:?}", path))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) if path.exists() => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        _ => EngineConfig::default(),
    };

    let _log_guard = init_logging(&config.logging);
    tracing::info!("Starting ActSeq with config {:?}", config_path);

    let preset = select_preset(&args, &config)?;
    tracing::info!(
        "Using preset '{}' ({} nodes, start '{}')",
        preset.id(),
        preset.len(),
        preset.start_id()
    );

    let segmenter = config.segmenter();
    tracing::info!(
        "Segmenting with {} weighting, boundary penalty {}",
        segmenter.model().weighting.display_name(),
        segmenter.model().boundary_penalty
    );

    let pool = SessionPool::new(config.pool.workers, segmenter)?;
    let mut handles = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let job = SessionJob {
            preset: Arc::clone(&preset),
            observations: read_observations(input)?,
            limits: config.quota,
        };
        handles.push((input, pool.submit(job)?));
    }

    let mut reports: Vec<SessionReport> = Vec::with_capacity(handles.len());
    for (input, handle) in handles {
        let report = handle
            .wait()
            .with_context(|| format!("session for {:?} failed", input))?;
        tracing::info!(
            "{:?}: {} ({} log entries, {} transitions charged)",
            input,
            report.status.display_name(),
            report.log.len(),
            report.quota.consumed_transitions
        );
        reports.push(report);
    }
    pool.shutdown();

    let json = serde_json::to_string_pretty(&reports)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?
        }
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    #[serial]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "actseq-rs",
            "--config",
            "engine.toml",
            "--preset",
            "assembly",
            "--output",
            "out.json",
            "a.json",
            "b.json",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("engine.toml")));
        assert_eq!(args.preset.as_deref(), Some("assembly"));
        assert_eq!(args.preset_file, None);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(
            args.inputs,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
    }

    #[test]
    fn test_preset_and_preset_file_conflict() {
        let err = Args::try_parse_from([
            "actseq-rs",
            "--preset",
            "assembly",
            "--preset-file",
            "preset.json",
            "a.json",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_inputs_required() {
        let err = Args::try_parse_from(["actseq-rs", "--preset", "assembly"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    #[serial]
    fn test_config_from_environment() {
        std::env::set_var("ACTSEQ_CONFIG", "/etc/actseq/custom.toml");
        let from_env = Args::try_parse_from(["actseq-rs", "a.json"]).unwrap();
        let from_flag =
            Args::try_parse_from(["actseq-rs", "--config", "local.toml", "a.json"]).unwrap();
        std::env::remove_var("ACTSEQ_CONFIG");

        assert_eq!(from_env.config, Some(PathBuf::from("/etc/actseq/custom.toml")));
        assert_eq!(from_flag.config, Some(PathBuf::from("local.toml")));

        let unset = Args::try_parse_from(["actseq-rs", "a.json"]).unwrap();
        assert_eq!(unset.config, None);
    }
}

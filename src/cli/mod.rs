//! Command-line interface
//!
//! `serve` runs the HTTP service, `classify` runs one local image through
//! the same pipeline, `info` loads the model and prints what it expects.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::inference::{ModelRuntime, OutputConvention};
use crate::monitoring::ServiceMetrics;
use crate::pipeline::ClassificationPipeline;
use crate::preprocessing::RawImage;
use crate::tracking::{ExperimentLogger, LogDispatch, LogOutcome};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 180, 80) }

/// Framed startup banner: a title line, then aligned key/value rows
fn banner(title: &str, rows: &[(&str, String)]) {
    let key_width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    let lines: Vec<(String, String)> = rows
        .iter()
        .map(|(k, v)| (format!("{:<key_width$}", k), v.clone()))
        .collect();
    let inner = lines
        .iter()
        .map(|(k, v)| k.chars().count() + 1 + v.chars().count())
        .chain(std::iter::once(title.chars().count()))
        .max()
        .unwrap_or(0)
        + 4;

    let rule = "─".repeat(inner);
    println!("  {}", dim(&format!("╭{}╮", rule)));
    let pad = inner - 2 - title.chars().count();
    println!("  {}  {}{}{}", dim("│"), title.white().bold(), " ".repeat(pad), dim("│"));
    println!("  {}", dim(&format!("├{}┤", rule)));
    for (key, value) in &lines {
        let pad = inner - 3 - key.chars().count() - value.chars().count();
        println!("  {}  {} {}{}{}", dim("│"), muted(key), value.white(), " ".repeat(pad), dim("│"));
    }
    println!("  {}", dim(&format!("╰{}╯", rule)));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "catdog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cat vs. dog image classifier with experiment tracking")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "CATDOG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Model selection flags shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    /// ONNX model artifact
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Output convention of the model head (sigmoid, softmax, probabilities)
    #[arg(short, long)]
    pub output: Option<OutputConvention>,
}

impl ModelArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref model) = self.model {
            config.inference.model_path = model.clone();
        }
        if let Some(output) = self.output {
            config.inference.output_convention = output;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// Server host
        #[arg(long)]
        host: Option<String>,

        /// Server port
        #[arg(short, long)]
        port: Option<u16>,

        #[command(flatten)]
        model: ModelArgs,

        /// Root directory of the experiment store
        #[arg(long)]
        tracking_dir: Option<PathBuf>,

        /// Keep serving health checks when the model cannot be loaded
        #[arg(long)]
        allow_missing_model: bool,
    },

    /// Classify a local image and print the response
    Classify {
        /// Image file
        image: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Do not record the run in the experiment store
        #[arg(long)]
        no_track: bool,
    },

    /// Load the model and print its input/output facts
    Info {
        #[command(flatten)]
        model: ModelArgs,
    },
}

fn load_config(path: Option<&Path>, model: &ModelArgs) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    model.apply(&mut config);
    config.validate()?;
    Ok(config)
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    model: &ModelArgs,
    tracking_dir: Option<PathBuf>,
    allow_missing_model: bool,
) -> anyhow::Result<()> {
    use crate::server::run_server;

    let mut config = AppConfig::load(config_path)?;
    model.apply(&mut config);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = tracking_dir {
        config.tracking.tracking_dir = dir;
    }
    if allow_missing_model {
        config.server.require_model = false;
    }
    config.validate()?;

    let base = format!("http://{}:{}", config.server.host, config.server.port);
    println!();
    banner(
        &format!("Cat/Dog Classifier v{}", env!("CARGO_PKG_VERSION")),
        &[
            ("Classify", format!("POST {}/api", base)),
            ("Health", format!("{}/health", base)),
            ("Stats", format!("{}/api/stats", base)),
            ("Model", config.inference.model_path.display().to_string()),
            ("Output", config.inference.output_convention.to_string()),
        ],
    );
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    run_server(config).await
}

// ─── Classify ──────────────────────────────────────────────────────────────────

fn guess_content_type(path: &Path, bytes: &[u8]) -> String {
    image::ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(bytes))
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string())
}

pub fn cmd_classify(
    config_path: Option<&Path>,
    image_path: &Path,
    model: &ModelArgs,
    no_track: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path, model)?;
    config.tracking.dispatch = LogDispatch::Inline;
    if no_track {
        config.tracking.enabled = false;
    }

    let bytes = std::fs::read(image_path)?;
    let content_type = guess_content_type(image_path, &bytes);
    let mut raw = RawImage::new(bytes, content_type);
    if let Some(name) = image_path.file_name().and_then(|n| n.to_str()) {
        raw = raw.with_filename(name);
    }

    let metrics = Arc::new(ServiceMetrics::default());
    let logger = Arc::new(ExperimentLogger::local(config.tracking.clone(), Arc::clone(&metrics)));
    logger.bootstrap();
    let pipeline = ClassificationPipeline::from_config(&config, logger, metrics)?;

    let start = Instant::now();
    let (result, outcome) = pipeline.classify_and_record(&raw)?;
    let elapsed = start.elapsed();

    section("Classification");
    println!("{}", serde_json::to_string_pretty(&result.to_response())?);
    println!();
    println!("  {:<12} {:.1} ms", muted("Latency"), elapsed.as_secs_f64() * 1000.0);
    match outcome {
        LogOutcome::Recorded { run_id } => {
            println!("  {:<12} {} {}", muted("Run"), ok("✓"), run_id);
        }
        LogOutcome::Failed(message) => {
            println!("  {:<12} {} {}", muted("Run"), warn("!"), message);
        }
        LogOutcome::Disabled => {
            println!("  {:<12} {}", muted("Run"), dim("not tracked"));
        }
    }
    println!();
    Ok(())
}

// ─── Info ──────────────────────────────────────────────────────────────────────

pub fn cmd_info(config_path: Option<&Path>, model: &ModelArgs) -> anyhow::Result<()> {
    let config = load_config(config_path, model)?;

    let start = Instant::now();
    let runtime = ModelRuntime::load(config.inference.clone(), config.preprocessing.tensor_shape())?;
    let load_time = start.elapsed();

    section("Model");
    println!("  {:<14} {}", muted("Path"), config.inference.model_path.display());
    println!("  {:<14} {}", muted("Backend"), runtime.describe());
    println!("  {:<14} {:?} (NHWC)", muted("Input"), runtime.input_shape());
    println!(
        "  {:<14} {} ({} value(s))",
        muted("Output"),
        config.inference.output_convention,
        config.inference.output_convention.expected_width()
    );
    println!("  {:<14} {:.1} ms", muted("Load"), load_time.as_secs_f64() * 1000.0);

    section("Configuration");
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!();
    Ok(())
}

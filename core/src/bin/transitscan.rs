//! Command-line front end: analyze one light-curve file and print the
//! result as JSON on stdout.  Logs go to stderr.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use serde_json::{json, Value};

use transitscan_core::features::{Survey, TransitFeatures};
use transitscan_core::types::{PipelineFailure, PipelineParams, PipelineResult};
use transitscan_core::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "transitscan")]
#[command(about = "Search a stellar light curve for transiting planets")]
#[command(version)]
struct Args {
    /// Delimited text file with at least a flux column
    path: Option<PathBuf>,

    /// JSON file overriding pipeline parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Add classifier feature rows for this survey (kepler, k2, tess)
    #[arg(long)]
    survey: Option<Survey>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let Some(path) = args.path.as_deref() else {
        return emit(&failure("Usage: transitscan <PATH>", "usage_error"), args.pretty);
    };

    let params = match load_params(args.config.as_deref()) {
        Ok(p) => p,
        Err(e) => return emit(&failure(&format!("{e:#}"), "config_error"), args.pretty),
    };

    // Failure results are still well-formed output; exit status stays 0.
    let result = Pipeline::new(params).run_file(path);
    let mut value = match serde_json::to_value(&result) {
        Ok(v) => v,
        Err(e) => return emit(&failure(&e.to_string(), "serialization_error"), args.pretty),
    };

    if let (Some(survey), Some(report)) = (args.survey, result.report()) {
        let rows: Vec<TransitFeatures> = report
            .signals
            .iter()
            .map(|s| TransitFeatures::from_signal(s, survey))
            .collect();
        value["features"] = json!(rows);
    }

    print_json(&value, args.pretty);
    ExitCode::SUCCESS
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        LevelFilter::Error
    } else {
        match args.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    // RUST_LOG still wins when set.
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn load_params(config: Option<&Path>) -> Result<PipelineParams> {
    let Some(path) = config else {
        return Ok(PipelineParams::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
}

fn failure(error: &str, kind: &'static str) -> PipelineResult {
    PipelineResult::Failure(PipelineFailure {
        error: error.to_string(),
        kind,
    })
}

fn emit(result: &PipelineResult, pretty: bool) -> ExitCode {
    match serde_json::to_value(result) {
        Ok(v) => print_json(&v, pretty),
        Err(e) => eprintln!("{e}"),
    }
    ExitCode::FAILURE
}

fn print_json(value: &Value, pretty: bool) {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match text {
        Ok(t) => println!("{t}"),
        Err(e) => eprintln!("{e}"),
    }
}

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use sheetscan::scan::{run_scan, ScanConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "sheetscan")]
#[command(about = "Recognize scanned survey sheets and write a JSON report")]
struct Args {
    /// Scan configuration (layout, questionnaire and image lists).
    #[arg(long, short)]
    config: PathBuf,

    /// Report path; overrides `output_path` from the config.
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Emit tracing output as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    {
        let _ = args.log_level;
        tracing_log::LogTracer::init()?;
        sheetscan::core::init_tracing(args.json_logs);
    }
    #[cfg(not(feature = "tracing"))]
    sheetscan::core::init_with_level(args.log_level.into())?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(&args) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig::load_json(&args.config)?;
    let base_dir = args
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let report = run_scan(&config, &base_dir)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| base_dir.join(config.output_path()));
    report.write_json(&output)?;

    let valid = report
        .sheets
        .iter()
        .filter(|s| s.valid == Some(true))
        .count();
    println!(
        "recognized {valid}/{} sheets, report written to {}",
        report.sheets.len(),
        output.display()
    );
    #[cfg(not(feature = "tracing"))]
    {
        let tally = sheetscan::core::log_tally();
        if tally.warnings + tally.errors > 0 {
            println!("{} warnings, {} errors logged", tally.warnings, tally.errors);
        }
    }
    Ok(())
}

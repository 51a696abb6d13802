//! Operator-facing stderr logger for recognition runs.
//!
//! Info and above print as `LEVEL message`, which keeps the per-image
//! messages (`scan.tif, 2: page number not recognized`) readable in batch
//! output. Debug and trace records carry the elapsed time and target.
//! Records from outside the `sheetscan` crates only pass at warn or above.
//! Warnings and errors are tallied so a run can end with a summary.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

const CRATE_PREFIX: &str = "sheetscan";

/// Warnings and errors logged since the logger was installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogTally {
    pub warnings: usize,
    pub errors: usize,
}

struct ScanLogger {
    level: LevelFilter,
    started: Instant,
    warnings: AtomicUsize,
    errors: AtomicUsize,
}

fn passes(level: Level, target: &str, max: LevelFilter) -> bool {
    level <= max && (target.starts_with(CRATE_PREFIX) || level <= Level::Warn)
}

fn format_line(level: Level, target: &str, elapsed: f64, args: &fmt::Arguments<'_>) -> String {
    if level <= Level::Info {
        format!("{level:>5} {args}")
    } else {
        format!("[{elapsed:8.3}s {level:>5} {target}] {args}")
    }
}

impl Log for ScanLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        passes(metadata.level(), metadata.target(), self.level)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error => self.errors.fetch_add(1, Ordering::Relaxed),
            Level::Warn => self.warnings.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        let line = format_line(
            record.level(),
            record.target(),
            self.started.elapsed().as_secs_f64(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<ScanLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Later calls keep the first logger and its level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| ScanLogger {
            level,
            started: Instant::now(),
            warnings: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Counts kept by the logger installed with [`init_with_level`]; zero when
/// another logger is in use.
pub fn log_tally() -> LogTally {
    LOGGER
        .get()
        .map(|l| LogTally {
            warnings: l.warnings.load(Ordering::Relaxed),
            errors: l.errors.load(Ordering::Relaxed),
        })
        .unwrap_or_default()
}

/// Install a `tracing` subscriber; `RUST_LOG` overrides the default filter.
///
/// JSON output includes closed spans so per-stage timings can be extracted.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,sheetscan=info,sheetscan_core=info,sheetscan_recognize=info")
    });
    let builder = tracing_fmt().with_env_filter(filter);
    if json {
        let _ = builder
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = builder
            .with_target(false)
            .with_timer(tracing_fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

//! Minimal stderr logger.
//!
//! Records are printed as `[elapsed LEVEL target] message`. Install once at
//! startup with [`init_with_level`], or let [`init_from_env`] pick the level
//! from `STAINSEG_LOG`.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const LEVEL_ENV: &str = "STAINSEG_LOG";

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let target = record.target().rsplit("::").next().unwrap_or("");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:8.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            target,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install the stderr logger using the level named in `STAINSEG_LOG`.
///
/// Unset or unparsable values fall back to `default`.
pub fn init_from_env(default: LevelFilter) -> Result<(), log::SetLoggerError> {
    let level = std::env::var(LEVEL_ENV)
        .ok()
        .and_then(|raw| LevelFilter::from_str(raw.trim()).ok())
        .unwrap_or(default);
    init_with_level(level)
}

/// Filter used by [`init_tracing`] when neither `STAINSEG_LOG` nor `RUST_LOG`
/// is set: pipeline crates at `info`, everything else at `warn`.
#[cfg(feature = "tracing")]
pub const DEFAULT_TRACING_FILTER: &str = "warn,stainseg=info,stainseg_core=info,stainseg_ops=info";

/// Install a `tracing` subscriber with span close events.
///
/// The filter comes from `STAINSEG_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_TRACING_FILTER`]. `json` switches to flattened JSON lines.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = tracing_filter();
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(feature = "tracing")]
fn tracing_filter() -> EnvFilter {
    EnvFilter::try_from_env(LEVEL_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACING_FILTER))
}

#[cfg(all(test, feature = "tracing"))]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        let filter = EnvFilter::try_new(DEFAULT_TRACING_FILTER);
        assert!(filter.is_ok());
    }
}

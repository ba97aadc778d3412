//! Tracing setup for a relay node
//!
//! One console layer and an optional rolling log file share a single
//! filter. Reads log inside their `read_pipe` span; in JSON mode every event
//! carries that span's `request_id`, team and pipe id, and the span's close
//! event records how long the read was held open.

use std::fs;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Crates capped at warn unless `RUST_LOG` says otherwise
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "h2", "reqwest", "rustls", "tower_http"];

/// Keeps the log file writer flushing; hold until exit
pub struct LogGuards {
    _file: Option<WorkerGuard>,
}

/// Install the node's subscriber.
///
/// `RUST_LOG`, when set, replaces the level-derived filter entirely, so `-v`
/// and `-q` only matter without it.
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = effective_level(&settings.level, verbose, quiet);
    let filter = node_filter(level)?;

    let (file_layer, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (writer, guard) =
                rolling_writer(Path::new(path), settings.max_file_size_mb, settings.max_files)?;
            (Some(event_layer(writer, settings.json_format, false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(event_layer(std::io::stdout, settings.json_format, true))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        %level,
        file = settings.file.as_deref().unwrap_or("-"),
        json = settings.json_format,
        "Logging initialized"
    );

    Ok(LogGuards { _file: file_guard })
}

/// Warn-level logging for one-shot commands. Goes to stderr so it never
/// mixes with `config show` output.
pub fn init_simple(level: Level) -> Result<()> {
    fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))
}

fn effective_level(configured: &str, verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => configured.parse().unwrap_or(Level::INFO),
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn node_filter(level: Level) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    QUIET_DEPENDENCIES
        .iter()
        .try_fold(EnvFilter::new(level.to_string().to_lowercase()), |filter, krate| {
            let directive: Directive = format!("{}=warn", krate)
                .parse()
                .map_err(|e| Error::Config(format!("bad log directive for {}: {}", krate, e)))?;
            Ok(filter.add_directive(directive))
        })
}

fn event_layer<S, W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(true);
    if json {
        Box::new(
            layer
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_span_events(FmtSpan::CLOSE),
        )
    } else {
        Box::new(layer.compact().with_ansi(ansi))
    }
}

/// Non-blocking appender writing `<stem>.<period>.log` next to `path`
fn rolling_writer(path: &Path, max_size_mb: u64, max_files: u32) -> Result<(NonBlocking, WorkerGuard)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::IoWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("relay");
    let appender = RollingFileAppender::builder()
        .rotation(rotation_for(max_size_mb))
        .filename_prefix(stem)
        .filename_suffix("log")
        .max_log_files(max_files.max(1) as usize)
        .build(dir)
        .map_err(|e| Error::Config(format!("cannot open log file {}: {}", path.display(), e)))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// tracing-appender rotates on time only; a small size budget rotates hourly
fn rotation_for(max_size_mb: u64) -> Rotation {
    if max_size_mb > 0 && max_size_mb < 10 {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_effective_level() {
        assert_eq!(effective_level("debug", 0, false), Level::DEBUG);
        assert_eq!(effective_level("WARN", 0, false), Level::WARN);
        assert_eq!(effective_level("nonsense", 0, false), Level::INFO);
        assert_eq!(effective_level("error", 1, false), Level::DEBUG);
        assert_eq!(effective_level("info", 3, false), Level::TRACE);
        assert_eq!(effective_level("trace", 2, true), Level::ERROR);
    }

    #[test]
    fn test_node_filter_builds() {
        assert!(node_filter(Level::INFO).is_ok());
    }

    #[test]
    fn test_rotation_for_size() {
        assert_eq!(rotation_for(5), Rotation::HOURLY);
        assert_eq!(rotation_for(0), Rotation::DAILY);
        assert_eq!(rotation_for(100), Rotation::DAILY);
    }

    #[test]
    fn test_rolling_writer_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs").join("relay.log");

        let (_writer, _guard) = rolling_writer(&log_path, 100, 3).unwrap();

        assert!(temp_dir.path().join("logs").is_dir());
    }
}

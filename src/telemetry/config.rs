use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::{warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Set once from the global `--json` flag.
pub fn set_json_mode(v: bool) {
    let _ = JSON_MODE.set(v);
}

pub fn json_mode() -> bool {
    *JSON_MODE.get().unwrap_or(&false)
}

pub fn logs_are_json() -> bool {
    matches!(std::env::var("PSCRAPE_LOG_FORMAT").as_deref(), Ok("json"))
}

/// Directory for daily log files, from `PSCRAPE_LOG_DIR`. Blank means console only.
pub fn log_dir_from(value: Option<&str>) -> Option<PathBuf> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Keeps the non-blocking file writers flushing until dropped at exit.
#[must_use]
pub struct LogGuards(Vec<WorkerGuard>);

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer<F>(dir: &Path, prefix: &str, filter: F, guards: &mut Vec<WorkerGuard>) -> Result<BoxedLayer, InitError>
where
    F: Filter<Registry> + Send + Sync + 'static,
{
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    Ok(fmt::layer().with_writer(writer).with_ansi(false).with_filter(filter).boxed())
}

/// Daily files under `dir`: `app.log` (everything from debug), `error.log`
/// (errors only), `scraper.log` (fetch, extraction and crawl events).
fn file_layers(dir: &Path, guards: &mut Vec<WorkerGuard>) -> Result<Vec<BoxedLayer>, InitError> {
    let scraper = Targets::new()
        .with_target("pscrape::fetch", Level::DEBUG)
        .with_target("pscrape::extractor", Level::DEBUG)
        .with_target("pscrape::pipeline", Level::DEBUG);
    Ok(vec![
        file_layer(dir, "app.log", EnvFilter::new("info,pscrape=debug"), guards)?,
        file_layer(dir, "error.log", LevelFilter::ERROR, guards)?,
        file_layer(dir, "scraper.log", scraper, guards)?,
    ])
}

/// Initialize tracing/logging according to RUST_LOG, PSCRAPE_LOG_FORMAT and PSCRAPE_LOG_DIR.
/// - Defaults to `info` if `RUST_LOG` is unset
/// - Supports `PSCRAPE_LOG_FORMAT=json` for JSON logs (stderr)
/// - With `PSCRAPE_LOG_DIR`, also writes daily rotated files there
pub fn init_tracing() -> LogGuards {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is reserved for result envelopes
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let console: BoxedLayer = if logs_are_json() {
        fmt_layer.json().flatten_event(true).with_filter(filter).boxed()
    } else {
        fmt_layer.compact().with_filter(filter).boxed()
    };

    let mut guards = Vec::new();
    let mut layers = vec![console];
    let log_dir = log_dir_from(std::env::var("PSCRAPE_LOG_DIR").ok().as_deref());
    let file_err = match &log_dir {
        Some(dir) => match file_layers(dir, &mut guards) {
            Ok(files) => {
                layers.extend(files);
                None
            }
            Err(e) => Some(e),
        },
        None => None,
    };

    let _ = tracing_subscriber::registry().with(layers).try_init();
    if let (Some(dir), Some(e)) = (&log_dir, file_err) {
        warn!(dir = %dir.display(), error = %e, "log files disabled");
    }
    LogGuards(guards)
}

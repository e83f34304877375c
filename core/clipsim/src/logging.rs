//! Tracing setup.
//!
//! Both modes log to stderr. The daemon also writes a daily-rolling file
//! under `$XDG_CACHE_HOME/clipsim/logs` when a cache directory exists.
//! `RUST_LOG` overrides the default level; `CLIPSIM_DEBUG_LOG=1` forces debug.

use std::env;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "CLIPSIM_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "clipsim.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Client,
    Daemon,
}

impl Mode {
    fn default_level(self) -> &'static str {
        match self {
            Mode::Client => "warn",
            Mode::Daemon => "info",
        }
    }
}

/// Keeps the file writer flushing; hold it for the life of the process.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init(mode: Mode) -> LoggingGuard {
    let filter = if debug_enabled(env::var(DEBUG_ENV).ok().as_deref()) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(mode.default_level()))
    };

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, file_guard) = match file_writer(mode) {
        Some((writer, guard)) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

fn file_writer(mode: Mode) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if mode != Mode::Daemon {
        return None;
    }
    let dir = clipsim_core::config::log_dir_from_env()?;
    if let Err(err) = fs_err::create_dir_all(&dir) {
        eprintln!("clipsim: file logging disabled: {err}");
        return None;
    }
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Some(tracing_appender::non_blocking(appender))
}

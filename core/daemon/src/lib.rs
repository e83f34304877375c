//! # clipsim-daemon
//!
//! The long-running half of clipsim. Two threads share one history:
//!
//! - **watcher** owns the X connection and appends every new CLIPBOARD owner's
//!   content.
//! - **ipc** owns the three FIFOs and answers the `clipsim` client.
//!
//! Neither thread holds the history lock across blocking I/O, with the
//! exception of `save`/`load` and the clipboard writer subprocess.

pub mod error;
pub mod fifo;
pub mod ipc;
pub mod notify;
pub mod shutdown;
pub mod state;
pub mod watcher;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clipsim_core::{CommandWriter, Config, History};
use clipsim_protocol::FifoPaths;

pub use error::{DaemonError, IpcError};
pub use notify::{CopyListener, CopyNotifier};
pub use state::{Capture, SelectionTarget, SharedState};
pub use watcher::SelectionWatcher;

const WATCHER_THREAD: &str = "clipsim-watcher";

/// Runs the daemon until the X connection fails or a termination signal
/// arrives.
pub fn run(config: Config) -> Result<(), DaemonError> {
    let paths = FifoPaths::from_env();
    fifo::prepare(&paths)?;

    let writer = CommandWriter::new(config.text_writer.clone(), config.image_writer.clone());
    let mut history = History::from_config(&config, Box::new(writer));
    match history.load() {
        Ok(entries) => tracing::info!(entries, "Restored history"),
        Err(err) => tracing::warn!(error = %err, "Starting with an empty history"),
    }

    let notifier = config
        .signal_target()
        .map(|(program, code)| CopyNotifier::new(program, code));
    let state = Arc::new(
        SharedState::new(history)
            .with_notifier(notifier)
            .with_restore_on_owner_exit(config.restore_on_owner_exit),
    );
    shutdown::install(Arc::clone(&state))?;

    let watcher = SelectionWatcher::connect(Duration::from_millis(config.debounce_ms))?;

    ipc::spawn(paths, Arc::clone(&state)).map_err(|source| DaemonError::Thread {
        name: ipc::THREAD_NAME,
        source,
    })?;

    let watcher_state = Arc::clone(&state);
    let handle = thread::Builder::new()
        .name(WATCHER_THREAD.to_string())
        .spawn(move || watcher.run(&watcher_state))
        .map_err(|source| DaemonError::Thread {
            name: WATCHER_THREAD,
            source,
        })?;
    tracing::info!(pid = std::process::id(), "clipsim daemon started");

    let result = handle
        .join()
        .map_err(|_| DaemonError::Panicked(WATCHER_THREAD))
        .and_then(|result| result);
    if let Err(err) = &result {
        tracing::error!(error = %err, "Selection watcher stopped");
        state.save_on_exit();
    }
    result
}

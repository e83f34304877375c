//! SIGINT/SIGTERM handling.

use std::sync::Arc;

use crate::error::DaemonError;
use crate::state::SharedState;

/// Saves the history and exits when the daemon is asked to stop.
///
/// The handler runs on ctrlc's own thread, so taking the history lock here
/// cannot deadlock against a signal arriving mid-operation.
pub fn install(state: Arc<SharedState>) -> Result<(), DaemonError> {
    ctrlc::set_handler(move || {
        tracing::info!("Termination requested; saving history");
        state.save_on_exit();
        std::process::exit(0);
    })?;
    Ok(())
}

//! State shared by the selection watcher and the FIFO server.
//!
//! One mutex guards the whole history. Both threads take it only for the
//! duration of a single history operation; FIFO reads and writes happen
//! outside it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use clipsim_core::{Appended, History};

use crate::notify::CopyListener;

/// Conversion targets requested from the selection owner, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    Utf8,
    Png,
    Targets,
}

impl SelectionTarget {
    pub const ALL: [SelectionTarget; 3] = [
        SelectionTarget::Utf8,
        SelectionTarget::Png,
        SelectionTarget::Targets,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SelectionTarget::Utf8 => "UTF8_STRING",
            SelectionTarget::Png => "image/png",
            SelectionTarget::Targets => "TARGETS",
        }
    }
}

/// Result of asking the selection owner for its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Content {
        target: SelectionTarget,
        bytes: Vec<u8>,
    },
    /// The owner wanted an incremental transfer; not supported.
    Incr,
    /// No target could be converted.
    Empty,
}

pub struct SharedState {
    history: Mutex<History>,
    notifier: Option<Box<dyn CopyListener>>,
    restore_on_owner_exit: bool,
}

impl SharedState {
    pub fn new(history: History) -> Self {
        Self {
            history: Mutex::new(history),
            notifier: None,
            restore_on_owner_exit: true,
        }
    }

    pub fn with_notifier<N: CopyListener + 'static>(mut self, notifier: Option<N>) -> Self {
        self.notifier = notifier.map(|listener| Box::new(listener) as Box<dyn CopyListener>);
        self
    }

    pub fn with_restore_on_owner_exit(mut self, enabled: bool) -> Self {
        self.restore_on_owner_exit = enabled;
        self
    }

    /// A panic while holding the lock leaves the history consistent enough to
    /// keep serving, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds one captured selection into the history. The notifier fires with
    /// the lock held, before the append.
    pub fn ingest(&self, capture: Capture) -> Option<Appended> {
        let mut history = self.lock();
        if let Some(notifier) = &self.notifier {
            notifier.notify();
        }

        match capture {
            Capture::Incr => {
                tracing::warn!("Selection owner requested INCR transfer; skipping");
                None
            }
            Capture::Empty => {
                tracing::debug!("Selection had no convertible target");
                None
            }
            Capture::Content {
                target: SelectionTarget::Targets,
                bytes,
            } => {
                tracing::warn!(
                    bytes = bytes.len(),
                    "Selection only offered a TARGETS list; discarding"
                );
                None
            }
            Capture::Content { target, bytes } => {
                tracing::debug!(target = target.name(), bytes = bytes.len(), "Captured selection");
                Some(history.append(bytes))
            }
        }
    }

    /// The clipboard owner went away; put our newest entry back.
    pub fn owner_gone(&self) {
        if !self.restore_on_owner_exit {
            return;
        }
        let mut history = self.lock();
        if history.is_empty() {
            return;
        }
        if let Err(err) = history.recover(-1) {
            tracing::warn!(error = %err, "Failed to restore clipboard after owner exit");
        }
    }

    pub fn save_on_exit(&self) {
        let history = self.lock();
        if history.is_empty() {
            return;
        }
        if let Err(err) = history.save() {
            tracing::warn!(error = %err, "Failed to save history on exit");
        }
    }
}

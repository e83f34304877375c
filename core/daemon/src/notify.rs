//! Signals an external program (a status bar, typically) on every copy.

use std::ffi::OsStr;
use std::path::Path;

use sysinfo::System;

/// Told about every capture, with the history lock held, before the append.
pub trait CopyListener: Send + Sync {
    fn notify(&self);
}

#[derive(Debug, Clone)]
pub struct CopyNotifier {
    program: String,
    signal: i32,
}

impl CopyNotifier {
    /// `code` is an offset from `SIGRTMIN`.
    pub fn new(program: &str, code: i32) -> Self {
        Self {
            program: program.to_string(),
            signal: libc::SIGRTMIN() + code,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn signal(&self) -> i32 {
        self.signal
    }
}

impl CopyListener for CopyNotifier {
    fn notify(&self) {
        let mut system = System::new();
        system.refresh_processes();

        for (pid, process) in system.processes() {
            if !argv0_matches(process.cmd(), &self.program) {
                continue;
            }
            let pid = pid.as_u32() as libc::pid_t;
            // SAFETY: kill has no memory-safety preconditions.
            let rc = unsafe { libc::kill(pid, self.signal) };
            if rc != 0 {
                tracing::warn!(
                    pid,
                    signal = self.signal,
                    error = %std::io::Error::last_os_error(),
                    "Failed to signal copy listener"
                );
            } else {
                tracing::debug!(pid, signal = self.signal, "Signalled copy listener");
            }
        }
    }
}

/// Matches on the basename of the first argv element.
fn argv0_matches(cmd: &[String], program: &str) -> bool {
    cmd.first()
        .and_then(|argv0| Path::new(argv0).file_name())
        .is_some_and(|name| name == OsStr::new(program))
}

//! Creates the named pipes the client talks to.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use clipsim_protocol::FifoPaths;
use fs_err as fs;

use crate::error::DaemonError;

const DIR_MODE: u32 = 0o770;
const FIFO_MODE: libc::mode_t = 0o600;

/// Creates the pipe directory and a fresh set of pipes, replacing any left
/// over from a previous run.
pub fn prepare(paths: &FifoPaths) -> Result<(), DaemonError> {
    let dir = paths.dir();
    match fs::create_dir(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
        Err(source) => return Err(fifo_error(dir, source)),
    }
    fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE))
        .map_err(|source| fifo_error(dir, source))?;

    for path in paths.all() {
        match fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale fifo"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(fifo_error(&path, source)),
        }
        make_fifo(&path).map_err(|source| fifo_error(&path, source))?;
    }

    tracing::info!(dir = %dir.display(), "Prepared fifos");
    Ok(())
}

fn make_fifo(path: &Path) -> io::Result<()> {
    let raw = CString::new(path.as_os_str().as_bytes())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    // SAFETY: `raw` is a valid NUL-terminated path for the duration of the call.
    let rc = unsafe { libc::mkfifo(raw.as_ptr(), FIFO_MODE) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn fifo_error(path: &Path, source: io::Error) -> DaemonError {
    DaemonError::Fifo {
        context: path.display().to_string(),
        source,
    }
}

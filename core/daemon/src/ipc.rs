//! FIFO command server.
//!
//! Each round-trip opens the command pipe afresh, reads one command byte and
//! dispatches it. Pipe I/O happens outside the history lock; responses are
//! rendered under the lock and written after it is released, so a slow reader
//! never stalls the selection watcher.

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clipsim_core::History;
use clipsim_protocol::{
    decode_id, empty_listing, info_image, info_text, push_listing_line, save_result, Command,
    FifoPaths, ID_BYTES,
};
use fs_err::{File, OpenOptions};

use crate::error::IpcError;
use crate::state::SharedState;

pub const THREAD_NAME: &str = "clipsim-ipc";
const POLL_INTERVAL: Duration = Duration::from_millis(5);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Serves commands until the process exits.
pub fn serve(paths: &FifoPaths, state: &SharedState) {
    tracing::info!(dir = %paths.dir().display(), "Command server listening");
    loop {
        thread::sleep(POLL_INTERVAL);
        match serve_one(paths, state) {
            Ok(command) => tracing::debug!(command = ?command, "Served command"),
            Err(IpcError::NoCommand) => {}
            Err(err) => {
                tracing::warn!(error = %err, "Command round-trip failed");
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

/// Spawns `serve` on a named thread.
pub fn spawn(
    paths: FifoPaths,
    state: Arc<SharedState>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || serve(&paths, &state))
}

/// Waits for one client and handles its command.
pub fn serve_one(paths: &FifoPaths, state: &SharedState) -> Result<Command, IpcError> {
    let byte = read_command_byte(paths)?;
    let command = match Command::try_from(byte) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(byte, "Invalid command");
            return Err(err.into());
        }
    };

    match command {
        Command::Print => {
            let listing = render_listing(&state.lock());
            write_content(paths, &listing)?;
        }
        Command::Save => {
            let saved = state.lock().save().is_ok();
            write_content(paths, &save_result(saved))?;
        }
        Command::Copy => {
            let id = read_id(paths)?;
            // Failures are already logged by the history.
            let _ = state.lock().recover(id);
        }
        Command::Remove => {
            let id = read_id(paths)?;
            let _ = state.lock().remove(id);
        }
        Command::Info => {
            let id = read_id(paths)?;
            let response = render_info(&state.lock(), id).unwrap_or_default();
            write_content(paths, &response)?;
        }
    }
    Ok(command)
}

/// PRINT response: newest first, one NUL-terminated line per entry.
pub fn render_listing(history: &History) -> Vec<u8> {
    if history.is_empty() {
        return empty_listing();
    }
    let mut out = Vec::new();
    for (index, entry) in history.recent() {
        push_listing_line(&mut out, index, entry.trimmed());
    }
    out
}

/// INFO response for `id`, or `None` when the id does not resolve.
pub fn render_info(history: &History, id: i32) -> Option<Vec<u8>> {
    if history.is_empty() {
        tracing::warn!("Clipboard history empty");
        return None;
    }
    let Some(index) = history.resolve_index(id) else {
        tracing::warn!(id, lastindex = history.lastindex(), "Invalid index");
        return None;
    };
    let entry = history.get(index)?;
    Some(match entry.image_path() {
        Some(path) => info_image(path),
        None => info_text(entry.content()),
    })
}

fn read_command_byte(paths: &FifoPaths) -> Result<u8, IpcError> {
    // Blocks until a client opens the pipe for writing.
    let mut fifo = File::open(paths.command()).map_err(IpcError::io("open command fifo"))?;
    let mut byte = [0u8; 1];
    let read = fifo
        .read(&mut byte)
        .map_err(IpcError::io("read command fifo"))?;
    if read == 0 {
        return Err(IpcError::NoCommand);
    }
    Ok(byte[0])
}

fn read_id(paths: &FifoPaths) -> Result<i32, IpcError> {
    let fifo = File::open(paths.passid()).map_err(IpcError::io("open id fifo"))?;
    let mut bytes = Vec::with_capacity(ID_BYTES);
    fifo.take(ID_BYTES as u64)
        .read_to_end(&mut bytes)
        .map_err(IpcError::io("read id fifo"))?;
    Ok(decode_id(&bytes)?)
}

fn write_content(paths: &FifoPaths, bytes: &[u8]) -> Result<(), IpcError> {
    let mut fifo = OpenOptions::new()
        .write(true)
        .open(paths.content())
        .map_err(IpcError::io("open content fifo"))?;
    fifo.write_all(bytes)
        .map_err(IpcError::io("write content fifo"))?;
    Ok(())
}

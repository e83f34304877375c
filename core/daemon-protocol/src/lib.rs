//! FIFO protocol types and framing for clipsim.
//!
//! This crate is shared by the daemon and its client so both ends agree on
//! command bytes, pipe locations and response framing. The daemon remains the
//! authority on validation.
//!
//! ## Pipes
//!
//! - `command.fifo`: the client writes exactly one command byte.
//! - `passid.fifo`: a signed 32-bit entry index in host byte order.
//! - `content.fifo`: framed response bytes, daemon to client. The daemon closes
//!   its end after every response so the reader sees EOF.

use std::env;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub const FIFO_DIR_ENV: &str = "CLIPSIM_FIFO_DIR";
pub const DEFAULT_FIFO_DIR: &str = "/tmp/clipsim";
pub const COMMAND_FIFO: &str = "command.fifo";
pub const PASSID_FIFO: &str = "passid.fifo";
pub const CONTENT_FIFO: &str = "content.fifo";

/// First byte of an INFO response that carries an image path instead of text.
pub const IMAGE_END: u8 = 0x02;
pub const EMPTY_HISTORY_MESSAGE: &str = "Clipboard history empty";
pub const INFO_HEADER_PREFIX: &str = "Length: ";
pub const ID_BYTES: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid command byte {0:#04x}")]
    InvalidCommand(u8),

    #[error("short read on id fifo: expected {ID_BYTES} bytes, got {0}")]
    ShortId(usize),

    #[error("daemon sent an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Print,
    Info,
    Copy,
    Remove,
    Save,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Print => b'p',
            Command::Info => b'i',
            Command::Copy => b'c',
            Command::Remove => b'x',
            Command::Save => b's',
        }
    }

    /// Whether the client follows the command byte with an index on the id fifo.
    pub fn takes_id(self) -> bool {
        matches!(self, Command::Info | Command::Copy | Command::Remove)
    }

    /// Whether the daemon answers on the content fifo.
    pub fn has_response(self) -> bool {
        matches!(self, Command::Print | Command::Info | Command::Save)
    }
}

impl TryFrom<u8> for Command {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'p' => Ok(Command::Print),
            b'i' => Ok(Command::Info),
            b'c' => Ok(Command::Copy),
            b'x' => Ok(Command::Remove),
            b's' => Ok(Command::Save),
            other => Err(ProtocolError::InvalidCommand(other)),
        }
    }
}

/// Locations of the three pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoPaths {
    dir: PathBuf,
}

impl FifoPaths {
    /// Resolves the pipe directory, honouring `CLIPSIM_FIFO_DIR`.
    pub fn from_env() -> Self {
        match env::var_os(FIFO_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::with_dir(dir),
            _ => Self::with_dir(DEFAULT_FIFO_DIR),
        }
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn command(&self) -> PathBuf {
        self.dir.join(COMMAND_FIFO)
    }

    pub fn passid(&self) -> PathBuf {
        self.dir.join(PASSID_FIFO)
    }

    pub fn content(&self) -> PathBuf {
        self.dir.join(CONTENT_FIFO)
    }

    pub fn all(&self) -> [PathBuf; 3] {
        [self.command(), self.passid(), self.content()]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Id fifo
// ─────────────────────────────────────────────────────────────────────────────

/// Host byte order; the pipe never leaves the machine.
pub fn encode_id(id: i32) -> [u8; ID_BYTES] {
    id.to_ne_bytes()
}

pub fn decode_id(bytes: &[u8]) -> Result<i32, ProtocolError> {
    let raw: [u8; ID_BYTES] = bytes
        .try_into()
        .map_err(|_| ProtocolError::ShortId(bytes.len()))?;
    Ok(i32::from_ne_bytes(raw))
}

// ─────────────────────────────────────────────────────────────────────────────
// Content fifo framing
// ─────────────────────────────────────────────────────────────────────────────

/// Appends one PRINT line: zero-padded id, a space, the preview, NUL.
pub fn push_listing_line(out: &mut Vec<u8>, index: usize, preview: &[u8]) {
    out.extend_from_slice(format!("{:03} ", index).as_bytes());
    out.extend_from_slice(preview);
    out.push(0);
}

pub fn empty_listing() -> Vec<u8> {
    let mut out = Vec::with_capacity(EMPTY_HISTORY_MESSAGE.len() + 5);
    push_listing_line(&mut out, 0, EMPTY_HISTORY_MESSAGE.as_bytes());
    out
}

pub fn info_text(content: &[u8]) -> Vec<u8> {
    let header = format!("{}{}\n", INFO_HEADER_PREFIX, content.len());
    let mut out = Vec::with_capacity(header.len() + content.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(content);
    out
}

pub fn info_image(path: &Path) -> Vec<u8> {
    let raw = path.as_os_str().as_bytes();
    let mut out = Vec::with_capacity(raw.len() + 1);
    out.push(IMAGE_END);
    out.extend_from_slice(raw);
    out
}

pub fn save_result(saved: bool) -> [u8; 1] {
    [u8::from(saved)]
}

pub fn parse_save_result(bytes: &[u8]) -> Result<bool, ProtocolError> {
    match bytes.first() {
        Some(byte) => Ok(*byte == 1),
        None => Err(ProtocolError::EmptyResponse),
    }
}

/// INFO response as seen by the client.
#[derive(Debug, PartialEq, Eq)]
pub enum InfoResponse<'a> {
    Image(PathBuf),
    Text(&'a [u8]),
}

pub fn parse_info(bytes: &[u8]) -> Result<InfoResponse<'_>, ProtocolError> {
    match bytes.split_first() {
        None => Err(ProtocolError::EmptyResponse),
        Some((&IMAGE_END, path)) => Ok(InfoResponse::Image(PathBuf::from(
            std::ffi::OsStr::from_bytes(path),
        ))),
        Some(_) => Ok(InfoResponse::Text(bytes)),
    }
}

//! History file codec.
//!
//! # File Format
//!
//! A concatenation of records, each `SEP || content` with `SEP = 0x01`:
//!
//! ```text
//! 01 'o' 'n' 'e' 01 't' 'w' 'o' 01 't' 'h' 'r' 'e' 'e'
//! ```
//!
//! There is no length prefix and no trailing separator. Older writers put the
//! separator after each record instead; the reader accepts both layouts and
//! the next save rewrites the file in the leading layout.
//!
//! Image entries are not written inline: PNG data almost always contains
//! `SEP`. They are written as a reference record, `IMAGE_RECORD` followed by
//! the path of the stored image, and the loader reads the image back from
//! that path. Any other content that contains `SEP` cannot be framed and is
//! not written.
//!
//! # Atomic Writes
//!
//! Writes go to a temp file in the same directory, are fsynced, then renamed
//! over the history file.

use fs_err as fs;
use std::ffi::OsString;
use std::io::{self, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::PersistError;

pub const SEP: u8 = 0x01;
/// Leads a record that names a stored image instead of carrying its bytes.
pub const IMAGE_RECORD: u8 = 0x02;
pub const HISTORY_DIR: &str = "clipsim";
pub const HISTORY_FILE: &str = "history";

/// Frames `records` in the leading-separator layout.
pub fn encode<'a, I>(records: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = Vec::new();
    for record in records {
        out.push(SEP);
        out.extend_from_slice(record);
    }
    out
}

/// `IMAGE_RECORD || path`
pub fn image_record(path: &Path) -> Vec<u8> {
    let path = path.as_os_str().as_bytes();
    let mut record = Vec::with_capacity(path.len() + 1);
    record.push(IMAGE_RECORD);
    record.extend_from_slice(path);
    record
}

/// The image path named by a reference record, if `record` is one.
pub fn image_reference(record: &[u8]) -> Option<PathBuf> {
    match record.split_first() {
        Some((&IMAGE_RECORD, path)) if !path.is_empty() => {
            Some(PathBuf::from(OsString::from_vec(path.to_vec())))
        }
        _ => None,
    }
}

/// Splits a history file into records, oldest first.
///
/// Empty records (doubled or trailing separators) are dropped. A non-empty
/// file that neither starts nor ends with a separator is rejected.
pub fn decode(bytes: &[u8]) -> Result<Vec<&[u8]>, String> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes[0] != SEP && bytes[bytes.len() - 1] != SEP {
        return Err("no record separator at either end of file".to_string());
    }
    Ok(bytes
        .split(|byte| *byte == SEP)
        .filter(|record| !record.is_empty())
        .collect())
}

#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<cache>/clipsim/history`
    pub fn in_cache_dir(cache_dir: &Path) -> Self {
        Self::new(cache_dir.join(HISTORY_DIR).join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file with `records`. Returns how many records were written.
    pub fn write<'a, I>(&self, records: I) -> Result<usize, PersistError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let writable: Vec<&[u8]> = records
            .into_iter()
            .filter(|record| {
                let framable = !record.contains(&SEP);
                if !framable {
                    tracing::warn!(
                        length = record.len(),
                        "Entry contains the record separator; not persisted"
                    );
                }
                framable
            })
            .collect();
        let payload = encode(writable.iter().copied());

        let parent = self
            .path
            .parent()
            .ok_or(PersistError::Unavailable("history path has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|source| io_error("create history directory", source))?;

        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|source| io_error("create temp history file", source))?;
        temp.write_all(&payload)
            .map_err(|source| io_error("write temp history file", source))?;
        temp.as_file()
            .sync_all()
            .map_err(|source| io_error("sync temp history file", source))?;
        temp.persist(&self.path)
            .map_err(|err| io_error("replace history file", err.error))?;

        Ok(writable.len())
    }

    /// Reads every record, oldest first. A missing file is an empty history.
    pub fn read(&self) -> Result<Vec<Vec<u8>>, PersistError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(io_error("read history file", source)),
        };

        let records = decode(&bytes).map_err(|details| PersistError::Malformed {
            path: self.path.clone(),
            details,
        })?;
        Ok(records.into_iter().map(<[u8]>::to_vec).collect())
    }
}

fn io_error(context: &str, source: io::Error) -> PersistError {
    PersistError::Io {
        context: context.to_string(),
        source,
    }
}

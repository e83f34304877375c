//! In-memory clipboard history.
//!
//! Entries are dense and ordered oldest to newest; the newest sits at
//! `lastindex` (`-1` when empty). Content is unique: appending something
//! already present moves the existing entry to the top instead.
//!
//! When an append fills the buffer to capacity, the older half is dropped and
//! the history is saved.
//!
//! Not thread-safe; the daemon wraps the whole structure in one mutex.

use fs_err as fs;
use std::borrow::Cow;
use std::path::PathBuf;

use crate::classify::{classify, strip_line_feeds, ContentKind};
use crate::clipboard::SelectionWriter;
use crate::config::{Config, RemoveTop};
use crate::entry::Entry;
use crate::error::{HistoryError, PersistError, Result};
use crate::images::ImageStore;
use crate::persist::{image_record, image_reference, HistoryFile};

pub const CAPACITY: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    pub capacity: usize,
    pub store_images: bool,
    pub remove_top: RemoveTop,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            capacity: CAPACITY,
            store_images: true,
            remove_top: RemoveTop::RecoverPrevious,
        }
    }
}

impl HistoryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            store_images: config.store_images,
            remove_top: config.remove_top,
            ..Self::default()
        }
    }

    /// Entries retained by a compaction and by a load.
    pub fn keep(&self) -> usize {
        self.capacity / 2
    }
}

/// Outcome of `History::append`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// The content was our own publish coming back; the echo flag is now clear.
    SuppressedEcho,
    Rejected(ContentKind),
    /// Already present at `from`; moved to the top.
    Promoted { from: usize },
    Inserted { index: usize, compacted: bool },
}

pub struct History {
    entries: Vec<Entry>,
    recovered: bool,
    policy: HistoryPolicy,
    file: Option<HistoryFile>,
    images: Option<ImageStore>,
    writer: Box<dyn SelectionWriter>,
}

impl History {
    pub fn new(policy: HistoryPolicy, writer: Box<dyn SelectionWriter>) -> Self {
        Self {
            entries: Vec::with_capacity(policy.capacity),
            recovered: false,
            policy,
            file: None,
            images: None,
            writer,
        }
    }

    pub fn from_config(config: &Config, writer: Box<dyn SelectionWriter>) -> Self {
        let mut history = Self::new(HistoryPolicy::from_config(config), writer);
        history.file = config.history_file();
        history.images = config.image_store();
        history
    }

    pub fn with_file(mut self, file: HistoryFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn with_images(mut self, images: ImageStore) -> Self {
        self.images = Some(images);
        self
    }

    pub fn policy(&self) -> &HistoryPolicy {
        &self.policy
    }

    pub fn lastindex(&self) -> i32 {
        self.entries.len() as i32 - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Newest first, paired with each entry's index.
    pub fn recent(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.entries.iter().enumerate().rev()
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered
    }

    /// Maps a client id to an index. Negative ids count back from the top,
    /// so `-1` is the newest entry.
    pub fn resolve_index(&self, id: i32) -> Option<usize> {
        let last = i64::from(self.lastindex());
        let resolved = if id < 0 {
            last + i64::from(id) + 1
        } else {
            i64::from(id)
        };
        if resolved < 0 || resolved > last {
            return None;
        }
        Some(resolved as usize)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn append(&mut self, mut content: Vec<u8>) -> Appended {
        if self.recovered {
            self.recovered = false;
            tracing::debug!(bytes = content.len(), "Ignoring our own clipboard write");
            return Appended::SuppressedEcho;
        }

        strip_line_feeds(&mut content);
        let kind = classify(&content);
        if let Some(rejected) = self.reject_reason(kind) {
            return Appended::Rejected(rejected);
        }

        if let Some(found) = self.position_of(&content) {
            self.reorder(found);
            tracing::debug!(from = found, to = self.lastindex(), "Promoted duplicate entry");
            return Appended::Promoted { from: found };
        }

        let entry = match self.build_entry(content, kind) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "Dropping clipboard entry");
                return Appended::Rejected(kind);
            }
        };
        self.entries.push(entry);
        tracing::info!(
            index = self.lastindex(),
            length = self.entries[self.entries.len() - 1].content_length(),
            "Captured clipboard entry"
        );

        let compacted = self.entries.len() >= self.policy.capacity;
        if compacted {
            self.compact();
            if let Err(err) = self.save() {
                tracing::warn!(error = %err, "Failed to save history after compaction");
            }
        }

        Appended::Inserted {
            index: self.entries.len() - 1,
            compacted,
        }
    }

    /// Publishes entry `id` to the clipboard and moves it to the top.
    ///
    /// Arms the echo flag so the selection change this causes is not captured
    /// again. An out-of-range id arms it as well.
    pub fn recover(&mut self, id: i32) -> Result<usize> {
        if self.entries.is_empty() {
            tracing::warn!("Clipboard history empty");
            return Err(HistoryError::Empty);
        }

        let index = match self.resolve_index(id) {
            Some(index) => index,
            None => {
                tracing::warn!(id, lastindex = self.lastindex(), "Invalid index");
                self.recovered = true;
                return Err(HistoryError::InvalidIndex(id));
            }
        };

        let entry = &self.entries[index];
        self.writer.publish(entry.content(), entry.is_image())?;

        let last = self.entries.len() - 1;
        if index != last {
            self.reorder(index);
        }
        self.recovered = true;
        tracing::info!(index, "Recovered entry");
        Ok(last)
    }

    pub fn remove(&mut self, id: i32) -> Result<()> {
        if self.entries.is_empty() {
            tracing::warn!("Clipboard history empty");
            return Err(HistoryError::Empty);
        }

        let index = self.resolve_index(id).ok_or_else(|| {
            tracing::warn!(id, lastindex = self.lastindex(), "Invalid index");
            HistoryError::InvalidIndex(id)
        })?;
        let last = self.entries.len() - 1;

        if index == last && last > 0 && self.policy.remove_top == RemoveTop::RecoverPrevious {
            // The previous entry becomes the clipboard content, then the old top
            // (now one below it) goes away.
            match self.recover(-2) {
                Ok(_) => {
                    self.entries.remove(last - 1);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Could not publish previous entry; removing newest only");
                    self.entries.remove(last);
                }
            }
        } else {
            self.entries.remove(index);
        }

        tracing::info!(index, lastindex = self.lastindex(), "Removed entry");
        Ok(())
    }

    /// Moves entry `index` to the top, keeping the others in order.
    pub fn reorder(&mut self, index: usize) {
        if index + 1 >= self.entries.len() {
            return;
        }
        let entry = self.entries.remove(index);
        self.entries.push(entry);
    }

    /// Drops the oldest entries so that only the newest `keep` remain.
    pub fn compact(&mut self) {
        let keep = self.policy.keep();
        if self.entries.len() <= keep {
            return;
        }
        let dropped = self.entries.len() - keep;
        self.entries.drain(..dropped);
        tracing::info!(dropped, lastindex = self.lastindex(), "Compacted history");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Writes every entry to the history file. Returns how many were written.
    ///
    /// Image entries are written as references to their stored file.
    pub fn save(&self) -> Result<usize> {
        if self.entries.is_empty() {
            tracing::warn!("Clipboard history empty; nothing to save");
            return Err(HistoryError::Empty);
        }
        let file = self
            .file
            .as_ref()
            .ok_or(PersistError::Unavailable("XDG_CACHE_HOME is not set"))?;

        let records: Vec<Cow<'_, [u8]>> = self
            .entries
            .iter()
            .map(|entry| match entry.image_path() {
                Some(path) => Cow::Owned(image_record(path)),
                None => Cow::Borrowed(entry.content()),
            })
            .collect();
        let written = file.write(records.iter().map(|record| &**record))?;
        tracing::info!(entries = written, path = %file.path().display(), "Saved history");
        Ok(written)
    }

    /// Replaces the in-memory history with the newest `keep` records on disk.
    pub fn load(&mut self) -> Result<usize> {
        self.entries.clear();
        let file = self
            .file
            .as_ref()
            .ok_or(PersistError::Unavailable("XDG_CACHE_HOME is not set"))?;
        let records = file.read()?;

        for mut record in records {
            let stored_image = image_reference(&record);
            if let Some(path) = &stored_image {
                record = match fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!(error = %err, "Skipping image record");
                        continue;
                    }
                };
            } else {
                strip_line_feeds(&mut record);
            }

            let kind = classify(&record);
            if self.reject_reason(kind).is_some() {
                continue;
            }
            if let Some(found) = self.position_of(&record) {
                self.reorder(found);
                continue;
            }
            let entry = match stored_image {
                Some(path) => self.restore_image(record, kind, path),
                None => self.build_entry(record, kind),
            };
            match entry {
                Ok(entry) => self.entries.push(entry),
                Err(err) => tracing::warn!(error = %err, "Skipping history record"),
            }
        }

        let keep = self.policy.keep();
        if self.entries.len() > keep {
            let dropped = self.entries.len() - keep;
            self.entries.drain(..dropped);
        }

        tracing::info!(entries = self.entries.len(), "Loaded history");
        Ok(self.entries.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn position_of(&self, content: &[u8]) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.content_length() == content.len() && entry.content() == content)
    }

    fn reject_reason(&self, kind: ContentKind) -> Option<ContentKind> {
        match kind {
            ContentKind::Text => None,
            ContentKind::Image if self.policy.store_images => None,
            ContentKind::Image => {
                tracing::warn!("Image entries are disabled; dropping");
                Some(kind)
            }
            ContentKind::Large => {
                tracing::warn!("Entry too large; dropping");
                Some(kind)
            }
            ContentKind::Error | ContentKind::Other => {
                tracing::debug!(kind = ?kind, "Rejected clipboard content");
                Some(kind)
            }
        }
    }

    fn build_entry(&self, content: Vec<u8>, kind: ContentKind) -> Result<Entry> {
        if kind != ContentKind::Image {
            return Ok(Entry::text(content));
        }

        let images = self
            .images
            .as_ref()
            .ok_or_else(|| HistoryError::ImageStore("no cache directory".to_string()))?;
        let path = images
            .store(&content)
            .map_err(|err| HistoryError::ImageStore(err.to_string()))?;
        Ok(Entry::image(content, path))
    }

    /// Rebuilds an image entry from a reference record read back from `path`.
    fn restore_image(&self, content: Vec<u8>, kind: ContentKind, path: PathBuf) -> Result<Entry> {
        if kind != ContentKind::Image {
            return Err(HistoryError::ImageStore(format!(
                "{} is not a PNG image",
                path.display()
            )));
        }
        Ok(Entry::image(content, path))
    }
}

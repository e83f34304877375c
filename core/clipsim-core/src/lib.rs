//! # clipsim-core
//!
//! Data layer of the clipsim clipboard-history daemon: the bounded,
//! deduplicated history, content classification, the on-disk format and the
//! hook used to publish entries back to the X11 CLIPBOARD selection.
//!
//! ## Design Principles
//!
//! - **Synchronous**: no async runtime. The daemon drives it from two threads.
//! - **Not thread-safe**: callers provide the mutex (`clipsim_daemon::SharedState`).
//! - **Graceful degradation**: no cache directory means an in-memory history,
//!   not a failure.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clipsim_core::{CommandWriter, Config, History};
//!
//! let config = Config::resolve();
//! let writer = CommandWriter::new(config.text_writer.clone(), config.image_writer.clone());
//! let mut history = History::from_config(&config, Box::new(writer));
//! history.load()?;
//! history.append(b"copied text".to_vec());
//! ```

pub mod classify;
pub mod clipboard;
pub mod config;
pub mod entry;
pub mod error;
pub mod history;
pub mod images;
pub mod persist;

pub use classify::{classify, ContentKind, MAX_ENTRY_LENGTH, PREVIEW_CAP};
pub use clipboard::{CommandWriter, SelectionWriter};
pub use config::{Config, RemoveTop};
pub use entry::Entry;
pub use error::{ConfigError, HistoryError, PersistError, PublishError, Result};
pub use history::{Appended, History, HistoryPolicy, CAPACITY};
pub use images::ImageStore;
pub use persist::HistoryFile;

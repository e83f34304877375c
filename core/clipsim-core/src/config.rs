//! Runtime configuration.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `$XDG_CONFIG_HOME/clipsim/config.toml`
//! - environment (`XDG_CACHE_HOME`, `CLIPSIM_SIGNAL_PROGRAM`,
//!   `CLIPSIM_SIGNAL_CODE`, `CLIPSIM_IMAGE_PREVIEW`)
//!
//! A missing config file is not an error. Without `XDG_CACHE_HOME` the daemon
//! keeps its history in memory only.

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::images::ImageStore;
use crate::persist::{HistoryFile, HISTORY_DIR};

pub const CONFIG_FILE: &str = "config.toml";
pub const CACHE_ENV: &str = "XDG_CACHE_HOME";
pub const SIGNAL_PROGRAM_ENV: &str = "CLIPSIM_SIGNAL_PROGRAM";
pub const SIGNAL_CODE_ENV: &str = "CLIPSIM_SIGNAL_CODE";
pub const IMAGE_PREVIEW_ENV: &str = "CLIPSIM_IMAGE_PREVIEW";
pub const DEFAULT_IMAGE_PREVIEWER: &str = "chafa";
/// Offsets below this from `SIGRTMIN` are reserved.
pub const MIN_SIGNAL_CODE: i32 = 10;

/// What `remove` does when asked to delete the newest entry.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemoveTop {
    /// Publish the previous entry to the clipboard, then delete the newest.
    #[default]
    RecoverPrevious,
    /// Delete without touching the clipboard.
    DeleteOnly,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub store_images: bool,
    pub remove_top: RemoveTop,
    /// Re-publish the newest entry when the clipboard owner goes away.
    pub restore_on_owner_exit: bool,
    pub debounce_ms: u64,
    pub text_writer: Vec<String>,
    pub image_writer: Vec<String>,
    pub signal_program: Option<String>,
    pub signal_code: Option<i32>,
    pub image_previewer: String,
    #[serde(skip)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_images: true,
            remove_top: RemoveTop::RecoverPrevious,
            restore_on_owner_exit: true,
            debounce_ms: 10,
            text_writer: argv(&["/usr/bin/xsel", "-b", "-i"]),
            image_writer: argv(&["xclip", "-selection", "clipboard", "-t", "image/png", "-i"]),
            signal_program: None,
            signal_code: None,
            image_previewer: DEFAULT_IMAGE_PREVIEWER.to_string(),
            cache_dir: None,
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

impl Config {
    /// Loads the config file (falling back to defaults) and applies the environment.
    pub fn resolve() -> Self {
        let mut config = match default_config_path() {
            Some(path) => load_config(&path).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Failed to load config; using defaults");
                Config::default()
            }),
            None => Config::default(),
        };
        config.apply_env(|key| env::var(key).ok());
        config
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.cache_dir = lookup(CACHE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        if let Some(program) = lookup(SIGNAL_PROGRAM_ENV).filter(|value| !value.is_empty()) {
            self.signal_program = Some(program);
        }
        if let Some(raw) = lookup(SIGNAL_CODE_ENV) {
            match raw.trim().parse::<i32>() {
                Ok(code) => self.signal_code = Some(code),
                Err(_) => tracing::warn!(value = %raw, "Ignoring non-numeric {}", SIGNAL_CODE_ENV),
            }
        }
        if let Some(previewer) = lookup(IMAGE_PREVIEW_ENV).filter(|value| !value.is_empty()) {
            self.image_previewer = previewer;
        }
    }

    pub fn history_file(&self) -> Option<HistoryFile> {
        self.cache_dir.as_deref().map(HistoryFile::in_cache_dir)
    }

    pub fn image_store(&self) -> Option<ImageStore> {
        self.cache_dir
            .as_deref()
            .map(|dir| ImageStore::new(dir.join(HISTORY_DIR).join("images")))
    }

    /// Signal recipient, if both the program and a usable code are configured.
    pub fn signal_target(&self) -> Option<(&str, i32)> {
        let program = self.signal_program.as_deref()?;
        let code = self.signal_code?;
        if code < MIN_SIGNAL_CODE {
            tracing::warn!(
                code,
                minimum = MIN_SIGNAL_CODE,
                "Signal code too low; copy notifications disabled"
            );
            return None;
        }
        Some((program, code))
    }
}

/// Daemon log directory. Read straight from the environment so logging can
/// start before the config file is parsed.
pub fn log_dir_from_env() -> Option<PathBuf> {
    env::var_os(CACHE_ENV)
        .filter(|value| !value.is_empty())
        .map(|dir| PathBuf::from(dir).join(HISTORY_DIR).join("logs"))
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(HISTORY_DIR).join(CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<Config>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

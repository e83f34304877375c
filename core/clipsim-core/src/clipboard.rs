//! Publishing entries back into the CLIPBOARD selection.
//!
//! The daemon never serves the selection itself: it hands the bytes to an
//! external tool (`xsel`, `xclip`) on stdin and waits for it to detach.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::PublishError;

/// Something that can make `content` the current clipboard selection.
pub trait SelectionWriter: Send {
    fn publish(&self, content: &[u8], image: bool) -> Result<(), PublishError>;
}

/// Runs a configured command per publish, feeding the content on stdin.
#[derive(Debug, Clone)]
pub struct CommandWriter {
    text: Vec<String>,
    image: Vec<String>,
}

impl CommandWriter {
    pub fn new(text: Vec<String>, image: Vec<String>) -> Self {
        Self { text, image }
    }

    fn run(argv: &[String], content: &[u8]) -> Result<(), PublishError> {
        let (program, args) = argv.split_first().ok_or(PublishError::NoCommand)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PublishError::Spawn {
                command: program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content)
                .map_err(|source| PublishError::Spawn {
                    command: program.clone(),
                    source,
                })?;
        }

        let status = child.wait().map_err(|source| PublishError::Spawn {
            command: program.clone(),
            source,
        })?;
        if !status.success() {
            return Err(PublishError::Exit {
                command: program.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

impl SelectionWriter for CommandWriter {
    fn publish(&self, content: &[u8], image: bool) -> Result<(), PublishError> {
        let argv = if image { &self.image } else { &self.text };
        tracing::debug!(command = ?argv, bytes = content.len(), image, "Publishing selection");
        Self::run(argv, content)
    }
}

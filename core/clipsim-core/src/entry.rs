//! A single captured clipboard payload.

use std::path::{Path, PathBuf};

use crate::classify::trim;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Preview {
    /// The preview is the content itself.
    Shared,
    Owned(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    content: Vec<u8>,
    preview: Preview,
    image_path: Option<PathBuf>,
}

impl Entry {
    /// Builds a text entry, deriving its preview.
    pub fn text(content: Vec<u8>) -> Self {
        let preview = match trim(&content) {
            Some(trimmed) => Preview::Owned(trimmed),
            None => Preview::Shared,
        };
        Self {
            content,
            preview,
            image_path: None,
        }
    }

    /// Builds an image entry whose payload is stored at `path`.
    pub fn image(content: Vec<u8>, path: PathBuf) -> Self {
        let preview = format!("[image] {}", path.display()).into_bytes();
        Self {
            content,
            preview: Preview::Owned(preview),
            image_path: Some(path),
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_length(&self) -> usize {
        self.content.len()
    }

    pub fn trimmed(&self) -> &[u8] {
        match &self.preview {
            Preview::Shared => &self.content,
            Preview::Owned(preview) => preview,
        }
    }

    pub fn trimmed_length(&self) -> usize {
        self.trimmed().len()
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn is_image(&self) -> bool {
        self.image_path.is_some()
    }

    pub fn preview_is_shared(&self) -> bool {
        matches!(self.preview, Preview::Shared)
    }
}

//! On-disk store for image payloads.
//!
//! Files are named by the MD5 of their bytes, so re-storing the same image is
//! a no-op and a history reload can find the file again from the content alone.

use fs_err as fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, content: &[u8]) -> PathBuf {
        self.dir.join(format!("{:x}.png", md5::compute(content)))
    }

    /// Writes `content` unless an identical file is already present.
    pub fn store(&self, content: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(content);
        if path.exists() {
            return Ok(path);
        }
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, content)?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Stored image");
        Ok(path)
    }
}

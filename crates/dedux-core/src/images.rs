//! Receipt image storage.
//!
//! Images are stored under the data directory named by their SHA-256
//! content hash, so the same upload never lands twice. Transactions hold
//! the relative file name as their `receipt_image` reference.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Content-addressed store for uploaded receipt images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store image bytes, returning the relative file name.
    ///
    /// Writes go through a temp file in the same directory so a partial
    /// write never leaves a truncated image under its final name.
    pub fn save(&self, image: &[u8]) -> Result<String> {
        if image.is_empty() {
            return Err(Error::InvalidData("Empty image upload".into()));
        }

        let digest = hex::encode(Sha256::digest(image));
        let name = format!("{digest}.{}", image_extension(image));
        let path = self.dir.join(&name);

        if path.exists() {
            debug!(name = name.as_str(), "Image already stored");
            return Ok(name);
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(image)?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

        debug!(name = name.as_str(), bytes = image.len(), "Stored receipt image");
        Ok(name)
    }

    /// Absolute path for a stored file name.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Read a stored image back.
    pub fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("Image {name} not found"))
            }
            _ => Error::Io(e),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// File extension from magic bytes, for the common receipt formats.
fn image_extension(image: &[u8]) -> &'static str {
    if image.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if image.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if image.len() >= 12 && &image[..4] == b"RIFF" && &image[8..12] == b"WEBP" {
        "webp"
    } else {
        "bin"
    }
}

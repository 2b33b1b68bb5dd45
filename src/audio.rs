//! Transient audio store
//!
//! Uploaded recordings are written to uniquely named temporary files so the
//! speech recognizer can read them by path. A [`TransientAudio`] owns its file:
//! the file is deleted on [`TransientAudio::release`] or, failing that, when
//! the handle is dropped, so every exit path of a request cleans up.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{Error, Result};

/// Creates transient audio artifacts in a fixed directory
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    extension: String,
}

impl AudioStore {
    /// Create a store writing `.{extension}` files into `dir`
    #[must_use]
    pub fn new(dir: PathBuf, extension: impl Into<String>) -> Self {
        Self {
            dir,
            extension: extension.into(),
        }
    }

    /// Create a store in the OS temporary directory
    #[must_use]
    pub fn in_temp_dir(extension: impl Into<String>) -> Self {
        Self::new(std::env::temp_dir(), extension)
    }

    /// Directory artifacts are created in
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a new temporary file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written
    pub fn persist(&self, bytes: &[u8]) -> Result<TransientAudio> {
        let suffix = format!(".{}", self.extension);
        let mut file = tempfile::Builder::new()
            .prefix("parley-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(|e| {
                Error::Storage(format!(
                    "failed to create temp file in {}: {e}",
                    self.dir.display()
                ))
            })?;

        file.write_all(bytes)
            .and_then(|()| file.flush())
            .map_err(|e| Error::Storage(format!("failed to write audio: {e}")))?;

        tracing::debug!(
            path = %file.path().display(),
            bytes = bytes.len(),
            "persisted transient audio"
        );

        Ok(TransientAudio {
            file,
            len: bytes.len(),
        })
    }
}

/// A short-lived audio file owned by one request
#[derive(Debug)]
pub struct TransientAudio {
    file: NamedTempFile,
    len: usize,
}

impl TransientAudio {
    /// Filesystem path of the artifact
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Size of the stored audio in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the stored audio is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File name to present to upstream services (e.g. `recording.webm`)
    #[must_use]
    pub fn upload_name(&self) -> String {
        self.path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(|| "recording".to_string(), |ext| format!("recording.{ext}"))
    }

    /// Read the artifact back into memory
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(self.path())
            .await
            .map_err(|e| Error::Storage(format!("failed to read audio: {e}")))
    }

    /// Delete the artifact
    ///
    /// # Errors
    ///
    /// Returns error if the file could not be removed
    pub fn release(self) -> Result<()> {
        let path = self.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| Error::Storage(format!("failed to remove {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "released transient audio");
        Ok(())
    }
}

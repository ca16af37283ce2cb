//! Local filesystem writer for accepted uploads

use super::types::{StorageError, StorageResult};
use crate::config::StorageSettings;
use crate::upload::ValidationResult;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Number of digest characters embedded in a stored filename
pub const HASH_PREFIX_LENGTH: usize = 16;

const DIRECTORY_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes accepted uploads with owner-only permissions
///
/// Files are named `{prefix}_{first 16 hex of hash}_{secure filename}`, so
/// distinct uploads never collide and byte-identical uploads map to the same
/// path. Writing the same content twice overwrites the file with identical
/// bytes.
///
/// A directory the writer creates is `0700`. The writer never changes the
/// permissions of a directory it did not create; an existing directory that
/// group or other users can access is refused with
/// [`StorageError::InvalidPath`].
///
/// Content is written to a temporary file created with mode `0600`, synced,
/// and renamed into place. A failure at any point removes the temporary
/// file, so a partially written or world-readable file is never left under
/// the final name.
///
/// # Examples
///
/// ```rust,no_run
/// use acton_upload::storage::SecureFileWriter;
/// use acton_upload::upload::{Category, FileSubmission, UploadValidator};
///
/// # async fn example() -> anyhow::Result<()> {
/// let result = UploadValidator::default()
///     .validate(FileSubmission::new("notes.txt", Category::Text, b"hello".to_vec()))?;
///
/// let writer = SecureFileWriter::new("/var/lib/my-app/uploads");
/// let path = writer.persist(&result).await?;
/// // /var/lib/my-app/uploads/secure_2cf24dba5fb0a30e_notes.txt
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SecureFileWriter {
    directory: PathBuf,
    prefix: String,
}

impl SecureFileWriter {
    /// Creates a writer for `directory` with the `secure` filename prefix
    ///
    /// The directory is created on first write.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: "secure".to_string(),
        }
    }

    /// Builds a writer from loaded configuration
    #[must_use]
    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(settings.directory.clone()).with_prefix(settings.filename_prefix.clone())
    }

    /// Replaces the stored filename prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Destination directory
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Name the result will be stored under
    ///
    /// Pure formatting over the digest and the sanitized name; no randomness.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if the digest is too short or
    /// the name could escape the destination directory.
    pub fn stored_filename(&self, result: &ValidationResult) -> StorageResult<String> {
        let hash_prefix = result
            .content_hash()
            .get(..HASH_PREFIX_LENGTH)
            .ok_or_else(|| StorageError::InvalidPath("content hash is too short".to_string()))?;

        let name = format!("{}_{hash_prefix}_{}", self.prefix, result.secure_filename());
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(StorageError::InvalidPath(format!(
                "{name} is not a plain filename"
            )));
        }

        Ok(name)
    }

    /// Stores an accepted result and returns its path
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotAccepted`] if the result was not accepted
    /// - [`StorageError::InvalidPath`] if a safe name cannot be derived
    /// - [`StorageError::Io`] on any filesystem failure
    pub async fn persist(&self, result: &ValidationResult) -> StorageResult<PathBuf> {
        if !result.is_accepted() {
            return Err(StorageError::NotAccepted);
        }

        let name = self.stored_filename(result)?;
        self.ensure_directory().await?;

        let final_path = self.directory.join(&name);
        let temp_path = self.directory.join(format!(
            ".upload-{}-{}-{}.tmp",
            &result.content_hash()[..HASH_PREFIX_LENGTH],
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = write_restricted(&temp_path, result.content()).await {
            discard(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            discard(&temp_path).await;
            return Err(e.into());
        }

        info!(
            path = %final_path.display(),
            size = result.size_bytes(),
            mime_type = result.mime_type(),
            "Stored upload"
        );

        Ok(final_path)
    }

    /// Creates the destination directory with owner-only access
    ///
    /// An existing directory is checked, never modified.
    async fn ensure_directory(&self) -> StorageResult<()> {
        if self.directory.exists() {
            if !self.directory.is_dir() {
                return Err(StorageError::InvalidPath(format!(
                    "{} is not a directory",
                    self.directory.display()
                )));
            }
            return ensure_private(&self.directory).await;
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIRECTORY_MODE);
        builder.create(&self.directory).await?;

        restrict(&self.directory, DIRECTORY_MODE).await?;
        Ok(())
    }
}

/// Writes content to a new file that is owner-only from creation
///
/// The handle is dropped before the mode is set again, on success and on
/// every early return.
async fn write_restricted(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    {
        let mut file = options.open(path).await?;
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await?;
    }

    restrict(path, FILE_MODE).await
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::error!(path = %path.display(), error = %e, "Failed to remove temporary upload file");
        }
    }
}

#[cfg(unix)]
async fn restrict(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(unix)]
async fn ensure_private(directory: &Path) -> StorageResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(directory).await?.permissions().mode() & 0o777;
    if mode & !DIRECTORY_MODE != 0 {
        return Err(StorageError::InvalidPath(format!(
            "{} has mode {mode:o}; an existing upload directory must be owner-only (700)",
            directory.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn ensure_private(_directory: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn restrict(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

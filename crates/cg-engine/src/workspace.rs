//! Working storage for the transcoding engine.
//!
//! A [`Workspace`] is a private temporary directory in which input and output
//! files are addressed by plain names, the way a virtual filesystem would
//! address them. The directory and everything left in it is removed when the
//! workspace is dropped.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;

/// Engine working storage.
///
/// # Example
///
/// ```no_run
/// use cg_engine::Workspace;
///
/// # async fn example() -> cg_core::Result<()> {
/// let ws = Workspace::new()?;
/// ws.write_file("input.mp4", b"...").await?;
/// let bytes = ws.read_file("input.mp4").await?;
/// ws.remove_file("input.mp4").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh, empty workspace directory.
    pub fn new() -> cg_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("clipgif-work-")
            .tempdir()
            .map_err(|e| cg_core::Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the workspace directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Resolve a storage name to its path inside the workspace.
    ///
    /// Names must be a single path component: no separators, no `.`/`..`.
    pub fn path_of(&self, name: &str) -> cg_core::Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\')
            && !name.contains('\0');
        if !valid {
            return Err(cg_core::Error::Validation(format!(
                "invalid working storage name '{name}'"
            )));
        }
        Ok(self.temp_dir.path().join(name))
    }

    /// Write `bytes` under `name`, replacing any existing file.
    pub async fn write_file(&self, name: &str, bytes: &[u8]) -> cg_core::Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::trace!("workspace: wrote {} bytes to {name}", bytes.len());
        Ok(())
    }

    /// Read the full content stored under `name`.
    pub async fn read_file(&self, name: &str) -> cg_core::Result<Bytes> {
        let path = self.path_of(name)?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    /// Remove `name`. Returns `false` if it did not exist.
    pub async fn remove_file(&self, name: &str) -> cg_core::Result<bool> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a file is stored under `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }
}

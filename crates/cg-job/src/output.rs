//! Output lifecycle.
//!
//! Each successful job produces one [`OutputResource`]: a GIF written to the
//! session's output directory, addressable by path or `file://` URL. The
//! [`OutputManager`] keeps at most one live resource. Installing a new one
//! releases the previous one in the same step. Closing or dropping the
//! manager releases whatever is left, and a closed manager accepts no more
//! outputs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use cg_core::config::OutputConfig;
use cg_core::events::{EventBus, EventPayload};
use cg_core::{Error, OutputId, Result};
use parking_lot::Mutex;
use tempfile::TempDir;

#[derive(Debug)]
struct ResourceInner {
    id: OutputId,
    path: PathBuf,
    mime_type: String,
    download_name: String,
    size_bytes: u64,
    released: AtomicBool,
}

/// Handle to one produced GIF. Clones share the same underlying file.
#[derive(Debug, Clone)]
pub struct OutputResource {
    inner: Arc<ResourceInner>,
}

impl OutputResource {
    pub fn id(&self) -> OutputId {
        self.inner.id
    }

    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.size_bytes
    }

    /// Suggested file name when saving.
    pub fn download_name(&self) -> &str {
        &self.inner.download_name
    }

    /// Location of the backing file. Invalid once released.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// `file://` URL of the backing file.
    pub fn url(&self) -> String {
        format!("file://{}", self.inner.path.display())
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Read the GIF bytes back.
    pub async fn bytes(&self) -> Result<Bytes> {
        self.ensure_live()?;
        let data = tokio::fs::read(&self.inner.path)
            .await
            .map_err(Error::output_read)?;
        Ok(Bytes::from(data))
    }

    /// Copy the GIF into `dir` under its download name.
    pub async fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(self.download_name());
        self.save_as(&dest).await?;
        Ok(dest)
    }

    /// Copy the GIF to an explicit destination path.
    pub async fn save_as(&self, dest: &Path) -> Result<()> {
        self.ensure_live()?;
        tokio::fs::copy(&self.inner.path, dest).await?;
        tracing::info!("Saved {} to {}", self.inner.id, dest.display());
        Ok(())
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::OutputRead(format!(
                "output {} has been released",
                self.inner.id
            )));
        }
        Ok(())
    }

    /// Delete the backing file. Returns `true` only for the call that
    /// actually released it.
    fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        match std::fs::remove_file(&self.inner.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove output {}: {e}",
                self.inner.path.display()
            ),
        }
        true
    }
}

#[derive(Default)]
struct Live {
    current: Option<OutputResource>,
    closed: bool,
}

/// Owns the session's output directory and the single live resource.
pub struct OutputManager {
    dir: TempDir,
    download_name: String,
    live: Mutex<Live>,
    events: Option<Arc<EventBus>>,
}

impl OutputManager {
    /// Create a manager with a fresh output directory.
    ///
    /// Fails with [`Error::Validation`] when the configured download name is
    /// not a plain file name.
    pub fn new(config: &OutputConfig, events: Option<Arc<EventBus>>) -> Result<Self> {
        config.check_download_name()?;
        let dir = tempfile::Builder::new().prefix("clipgif-out-").tempdir()?;
        Ok(Self {
            dir,
            download_name: config.download_name.clone(),
            live: Mutex::new(Live::default()),
            events,
        })
    }

    /// Directory holding output files.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Wrap `bytes` as a new resource and make it current, releasing the
    /// previous one. Fails with [`Error::Precondition`] once the manager is
    /// closed.
    pub async fn install_output(&self, bytes: Bytes, mime_type: &str) -> Result<OutputResource> {
        let id = OutputId::new();
        let ext = if mime_type == cg_core::GIF_MIME_TYPE {
            "gif"
        } else {
            "bin"
        };
        let path = self.dir.path().join(format!("{id}.{ext}"));
        tokio::fs::write(&path, &bytes).await?;

        let resource = OutputResource {
            inner: Arc::new(ResourceInner {
                id,
                path,
                mime_type: mime_type.to_string(),
                download_name: self.download_name.clone(),
                size_bytes: bytes.len() as u64,
                released: AtomicBool::new(false),
            }),
        };

        let previous = {
            let mut live = self.live.lock();
            if live.closed {
                drop(live);
                resource.release();
                return Err(Error::precondition("output manager is closed"));
            }
            live.current.replace(resource.clone())
        };
        if let Some(previous) = previous {
            self.release_resource(&previous);
        }

        tracing::debug!("Installed output {id} ({} bytes)", bytes.len());
        if let Some(ref events) = self.events {
            events.broadcast(EventPayload::OutputInstalled {
                output_id: id,
                mime_type: mime_type.to_string(),
            });
        }
        Ok(resource)
    }

    /// The live resource, if any.
    pub fn current(&self) -> Option<OutputResource> {
        self.live.lock().current.clone()
    }

    /// Release the live resource. Safe to call repeatedly.
    pub fn release_all(&self) {
        let current = self.live.lock().current.take();
        if let Some(resource) = current {
            self.release_resource(&resource);
        }
    }

    /// Release the live resource and refuse later installs.
    pub fn close(&self) {
        let current = {
            let mut live = self.live.lock();
            live.closed = true;
            live.current.take()
        };
        if let Some(resource) = current {
            self.release_resource(&resource);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.live.lock().closed
    }

    fn release_resource(&self, resource: &OutputResource) {
        if resource.release() {
            tracing::debug!("Released output {}", resource.id());
            if let Some(ref events) = self.events {
                events.broadcast(EventPayload::OutputReleased {
                    output_id: resource.id(),
                });
            }
        }
    }
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for OutputManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputManager")
            .field("dir", &self.dir.path())
            .field("current", &self.current().map(|r| r.id()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_core::GIF_MIME_TYPE;

    fn manager(events: Option<Arc<EventBus>>) -> OutputManager {
        OutputManager::new(&OutputConfig::default(), events).unwrap()
    }

    #[tokio::test]
    async fn install_writes_file() {
        let outputs = manager(None);
        let res = outputs
            .install_output(Bytes::from_static(b"GIF89a"), GIF_MIME_TYPE)
            .await
            .unwrap();

        assert!(res.path().exists());
        assert!(res.path().starts_with(outputs.dir()));
        assert_eq!(res.path().extension().unwrap(), "gif");
        assert!(res.url().starts_with("file://"));
        assert_eq!(res.size_bytes(), 6);
        assert_eq!(res.mime_type(), "image/gif");
        assert_eq!(res.download_name(), "output.gif");
        assert_eq!(res.bytes().await.unwrap().as_ref(), b"GIF89a");
        assert_eq!(outputs.current().unwrap().id(), res.id());
    }

    #[tokio::test]
    async fn second_install_releases_first() {
        let events = Arc::new(EventBus::new(16));
        let outputs = manager(Some(Arc::clone(&events)));
        let first = outputs
            .install_output(Bytes::from_static(b"one"), GIF_MIME_TYPE)
            .await
            .unwrap();
        let second = outputs
            .install_output(Bytes::from_static(b"two"), GIF_MIME_TYPE)
            .await
            .unwrap();

        assert!(first.is_released());
        assert!(!first.path().exists());
        assert!(first.bytes().await.is_err());
        assert!(!second.is_released());
        assert_eq!(outputs.current().unwrap().id(), second.id());

        let released: Vec<_> = events
            .recent_events(10)
            .into_iter()
            .filter(|e| matches!(e.payload, EventPayload::OutputReleased { .. }))
            .collect();
        assert_eq!(released.len(), 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let events = Arc::new(EventBus::new(16));
        let outputs = manager(Some(Arc::clone(&events)));
        let res = outputs
            .install_output(Bytes::from_static(b"gif"), GIF_MIME_TYPE)
            .await
            .unwrap();

        outputs.release_all();
        outputs.release_all();
        assert!(res.is_released());
        assert!(outputs.current().is_none());
        assert_eq!(
            events
                .recent_events(10)
                .iter()
                .filter(|e| matches!(e.payload, EventPayload::OutputReleased { .. }))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn save_to_uses_download_name() {
        let outputs = manager(None);
        let res = outputs
            .install_output(Bytes::from_static(b"GIF89a"), GIF_MIME_TYPE)
            .await
            .unwrap();
        let dest = tempfile::tempdir().unwrap();

        let saved = res.save_to(dest.path()).await.unwrap();
        assert_eq!(saved, dest.path().join("output.gif"));
        assert_eq!(std::fs::read(saved).unwrap(), b"GIF89a");
    }

    #[tokio::test]
    async fn closed_manager_rejects_install() {
        let outputs = manager(None);
        let res = outputs
            .install_output(Bytes::from_static(b"one"), GIF_MIME_TYPE)
            .await
            .unwrap();

        outputs.close();
        assert!(res.is_released());
        assert!(outputs.is_closed());

        let err = outputs
            .install_output(Bytes::from_static(b"two"), GIF_MIME_TYPE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert!(outputs.current().is_none());
        assert_eq!(std::fs::read_dir(outputs.dir()).unwrap().count(), 0);
    }

    #[test]
    fn rejects_download_name_with_path() {
        for name in ["../escape.gif", "nested/out.gif", ".."] {
            let config = OutputConfig {
                download_name: name.into(),
                ..OutputConfig::default()
            };
            let err = OutputManager::new(&config, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "accepted {name}");
        }
    }

    #[tokio::test]
    async fn drop_releases_current() {
        let outputs = manager(None);
        let res = outputs
            .install_output(Bytes::from_static(b"gif"), GIF_MIME_TYPE)
            .await
            .unwrap();
        drop(outputs);
        assert!(res.is_released());
        assert!(!res.path().exists());
    }
}

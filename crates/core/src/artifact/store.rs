//! File system artifact store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter, ReadBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::StorageConfig;
use super::error::StoreError;
use super::types::{display_name, ArtifactHandle, ArtifactRef, StoreStats, SweepReport};
use crate::identity::MediaKind;
use crate::metrics;

const OBJECTS_DIR: &str = "objects";
const STAGING_DIR: &str = "staging";
const SCRATCH_DIR: &str = "scratch";
const SIDECAR_EXT: &str = "json";

#[derive(Debug)]
struct IndexEntry {
    artifact: ArtifactRef,
    leases: usize,
}

type Index = Arc<Mutex<HashMap<ArtifactHandle, IndexEntry>>>;

fn lock_index(index: &Index) -> MutexGuard<'_, HashMap<ArtifactHandle, IndexEntry>> {
    index.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Content area for completed downloads.
///
/// Only handles present in the in-memory index are served; an artifact
/// enters the index after its payload has been renamed into `objects/`, so
/// readers never observe a partial write.
pub struct ArtifactStore {
    config: StorageConfig,
    objects_dir: PathBuf,
    staging_dir: PathBuf,
    scratch_dir: PathBuf,
    index: Index,
}

impl ArtifactStore {
    /// Opens (or initializes) the store at `config.root`.
    ///
    /// Leftover staging and scratch data from a previous run is discarded
    /// and the index is rebuilt from the sidecar files.
    pub async fn open(config: StorageConfig) -> Result<Self, StoreError> {
        let objects_dir = config.root.join(OBJECTS_DIR);
        let staging_dir = config.root.join(STAGING_DIR);
        let scratch_dir = config.root.join(SCRATCH_DIR);

        for dir in [&staging_dir, &scratch_dir] {
            if fs::try_exists(dir).await.unwrap_or(false) {
                fs::remove_dir_all(dir)
                    .await
                    .map_err(|e| StoreError::io("clear directory", dir, e))?;
            }
        }
        for dir in [&objects_dir, &staging_dir, &scratch_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io("create directory", dir, e))?;
        }

        let store = Self {
            config,
            objects_dir,
            staging_dir,
            scratch_dir,
            index: Arc::new(Mutex::new(HashMap::new())),
        };
        let loaded = store.rebuild_index().await?;
        info!(
            "Artifact store opened at {:?} ({} artifacts)",
            store.config.root, loaded
        );
        Ok(store)
    }

    async fn rebuild_index(&self) -> Result<usize, StoreError> {
        let mut entries = fs::read_dir(&self.objects_dir)
            .await
            .map_err(|e| StoreError::io("read directory", &self.objects_dir, e))?;

        let mut sidecars = Vec::new();
        let mut payloads = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("read directory", &self.objects_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SIDECAR_EXT) {
                sidecars.push(path);
            } else {
                payloads.push(path);
            }
        }

        let mut loaded = HashMap::new();
        for sidecar in sidecars {
            let artifact = match Self::read_sidecar(&sidecar).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!("Dropping unreadable artifact sidecar {:?}: {}", sidecar, e);
                    let _ = fs::remove_file(&sidecar).await;
                    continue;
                }
            };
            let payload = self.payload_path(&artifact.handle);
            if fs::try_exists(&payload).await.unwrap_or(false) {
                loaded.insert(
                    artifact.handle.clone(),
                    IndexEntry {
                        artifact,
                        leases: 0,
                    },
                );
            } else {
                warn!("Dropping sidecar without payload: {:?}", sidecar);
                let _ = fs::remove_file(&sidecar).await;
            }
        }

        // Payloads without sidecars were never published.
        for payload in payloads {
            let known = payload
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| ArtifactHandle::parse(n).ok())
                .is_some_and(|h| loaded.contains_key(&h));
            if !known {
                debug!("Removing orphaned payload {:?}", payload);
                let _ = fs::remove_file(&payload).await;
            }
        }

        let count = loaded.len();
        *lock_index(&self.index) = loaded;
        Ok(count)
    }

    async fn read_sidecar(path: &Path) -> Result<ArtifactRef, StoreError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| StoreError::io("read sidecar", path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Metadata {
            path: path.to_path_buf(),
            source,
        })
    }

    fn payload_path(&self, handle: &ArtifactHandle) -> PathBuf {
        self.objects_dir.join(handle.as_str())
    }

    fn sidecar_path(&self, handle: &ArtifactHandle) -> PathBuf {
        self.objects_dir
            .join(format!("{}.{}", handle.as_str(), SIDECAR_EXT))
    }

    /// Creates a fresh scratch directory for an extractor run.
    pub async fn scratch(&self) -> Result<EncodeSink, StoreError> {
        let dir = self.scratch_dir.join(Uuid::new_v4().simple().to_string());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io("create scratch directory", &dir, e))?;
        Ok(EncodeSink { dir })
    }

    /// Stores the bytes produced by `reader` and publishes them atomically.
    pub async fn put_stream<R>(
        &self,
        mut reader: R,
        suggested_name: &str,
        media_kind: MediaKind,
        container: &str,
    ) -> Result<ArtifactRef, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let handle = ArtifactHandle::generate();
        let staged = self.staging_dir.join(format!("{}.part", handle.as_str()));

        let size_bytes = match self.write_staged(&mut reader, &staged).await {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&staged).await;
                return Err(e);
            }
        };

        self.publish(handle, &staged, size_bytes, suggested_name, media_kind, container)
            .await
    }

    async fn write_staged<R>(&self, reader: &mut R, staged: &Path) -> Result<u64, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let file = File::create(staged)
            .await
            .map_err(|e| StoreError::io("create staged file", staged, e))?;
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, file);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut total_bytes = 0u64;

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .await
                .map_err(|e| StoreError::io("read source", staged, e))?;
            if bytes_read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| StoreError::io("write staged file", staged, e))?;
            total_bytes += bytes_read as u64;
        }

        writer
            .flush()
            .await
            .map_err(|e| StoreError::io("flush staged file", staged, e))?;
        writer
            .get_ref()
            .sync_all()
            .await
            .map_err(|e| StoreError::io("sync staged file", staged, e))?;

        Ok(total_bytes)
    }

    /// Moves a finished file (usually from a scratch directory) into the
    /// store. The container is taken from the file extension.
    pub async fn put_file(
        &self,
        source: &Path,
        suggested_name: &str,
        media_kind: MediaKind,
    ) -> Result<ArtifactRef, StoreError> {
        let container = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());

        let handle = ArtifactHandle::generate();
        let staged = self.staging_dir.join(format!("{}.part", handle.as_str()));

        if Self::try_atomic_move(source, &staged)
            .await
            .map_err(|e| StoreError::io("move into staging", source, e))?
        {
            let size_bytes = fs::metadata(&staged)
                .await
                .map_err(|e| StoreError::io("stat staged file", &staged, e))?
                .len();
            return self
                .publish(handle, &staged, size_bytes, suggested_name, media_kind, &container)
                .await;
        }

        debug!("Cross-device move for {:?}, copying instead", source);
        let file = File::open(source)
            .await
            .map_err(|e| StoreError::io("open source", source, e))?;
        let artifact = self
            .put_stream(file, suggested_name, media_kind, &container)
            .await?;
        let _ = fs::remove_file(source).await;
        Ok(artifact)
    }

    /// Attempts a rename; `Ok(false)` when source and target live on
    /// different filesystems.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV is 18 on Linux
                if e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Writes the sidecar, renames the payload into `objects/` and registers
    /// the handle.
    async fn publish(
        &self,
        handle: ArtifactHandle,
        staged: &Path,
        size_bytes: u64,
        suggested_name: &str,
        media_kind: MediaKind,
        container: &str,
    ) -> Result<ArtifactRef, StoreError> {
        let artifact = ArtifactRef {
            handle: handle.clone(),
            size_bytes,
            media_kind,
            container: container.to_string(),
            display_name: display_name(suggested_name, container),
            created_at: Utc::now(),
        };

        let result = self.write_published(&artifact, staged).await;
        if let Err(e) = result {
            let _ = fs::remove_file(staged).await;
            let _ = fs::remove_file(self.sidecar_path(&handle)).await;
            return Err(e);
        }

        lock_index(&self.index).insert(
            handle.clone(),
            IndexEntry {
                artifact: artifact.clone(),
                leases: 0,
            },
        );
        metrics::ARTIFACTS_PUBLISHED.inc();
        metrics::ARTIFACT_BYTES_PUBLISHED.inc_by(size_bytes);
        info!(
            "Published artifact {} ({} bytes, {})",
            handle, size_bytes, artifact.display_name
        );

        Ok(artifact)
    }

    async fn write_published(&self, artifact: &ArtifactRef, staged: &Path) -> Result<(), StoreError> {
        let handle = &artifact.handle;
        let sidecar_tmp = self
            .staging_dir
            .join(format!("{}.{}.part", handle.as_str(), SIDECAR_EXT));
        let sidecar = self.sidecar_path(handle);
        let payload = self.payload_path(handle);

        let json = serde_json::to_vec_pretty(artifact).map_err(|source| StoreError::Metadata {
            path: sidecar.clone(),
            source,
        })?;
        fs::write(&sidecar_tmp, json)
            .await
            .map_err(|e| StoreError::io("write sidecar", &sidecar_tmp, e))?;
        fs::rename(&sidecar_tmp, &sidecar)
            .await
            .map_err(|e| StoreError::io("publish sidecar", &sidecar, e))?;
        fs::rename(staged, &payload)
            .await
            .map_err(|e| StoreError::io("publish payload", &payload, e))?;
        Ok(())
    }

    /// Looks up a caller-supplied handle.
    ///
    /// Malformed handles fail with [`StoreError::InvalidHandle`] before any
    /// filesystem access; unknown handles with [`StoreError::NotFound`].
    pub fn resolve(&self, raw_handle: &str) -> Result<ArtifactRef, StoreError> {
        let handle = ArtifactHandle::parse(raw_handle)?;
        lock_index(&self.index)
            .get(&handle)
            .map(|entry| entry.artifact.clone())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    /// Opens a published artifact for reading.
    ///
    /// The returned reader holds a lease; the sweep never deletes an
    /// artifact while any lease is alive.
    pub async fn open_reader(&self, raw_handle: &str) -> Result<ArtifactReader, StoreError> {
        let handle = ArtifactHandle::parse(raw_handle)?;

        let (artifact, lease) = {
            let mut index = lock_index(&self.index);
            let entry = index
                .get_mut(&handle)
                .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
            entry.leases += 1;
            (
                entry.artifact.clone(),
                ArtifactLease {
                    handle: handle.clone(),
                    index: Arc::clone(&self.index),
                },
            )
        };

        let path = self.payload_path(&handle);
        let file = File::open(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound(handle.to_string())
            } else {
                StoreError::io("open artifact", &path, e)
            }
        })?;

        Ok(ArtifactReader {
            artifact,
            file,
            _lease: lease,
        })
    }

    /// Deletes artifacts published before `now - retention` that have no
    /// open readers.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let cutoff = now - ChronoDuration::seconds(self.config.retention_secs as i64);
        let mut report = SweepReport::default();

        {
            let mut index = lock_index(&self.index);
            let expired: Vec<ArtifactHandle> = index
                .iter()
                .filter(|(_, entry)| entry.artifact.created_at <= cutoff)
                .map(|(handle, _)| handle.clone())
                .collect();
            for handle in expired {
                let leased = index.get(&handle).is_some_and(|e| e.leases > 0);
                if leased {
                    report.skipped_leased += 1;
                } else {
                    index.remove(&handle);
                    report.removed.push(handle);
                }
            }
        }

        for handle in &report.removed {
            for path in [self.payload_path(handle), self.sidecar_path(handle)] {
                if let Err(e) = fs::remove_file(&path).await {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to delete {:?}: {}", path, e);
                    }
                }
            }
        }

        if !report.removed.is_empty() {
            metrics::ARTIFACTS_SWEPT.inc_by(report.removed.len() as u64);
            info!(
                "Artifact sweep removed {} artifacts ({} leased, kept)",
                report.removed.len(),
                report.skipped_leased
            );
        }

        report
    }

    /// Current store statistics.
    pub fn stats(&self) -> StoreStats {
        let index = lock_index(&self.index);
        StoreStats {
            artifacts: index.len(),
            total_bytes: index.values().map(|e| e.artifact.size_bytes).sum(),
            open_readers: index.values().map(|e| e.leases).sum(),
        }
    }
}

/// Scoped lease on a published artifact. Released on drop.
#[derive(Debug)]
pub struct ArtifactLease {
    handle: ArtifactHandle,
    index: Index,
}

impl Drop for ArtifactLease {
    fn drop(&mut self) {
        if let Some(entry) = lock_index(&self.index).get_mut(&self.handle) {
            entry.leases = entry.leases.saturating_sub(1);
        }
    }
}

/// Byte stream over a published artifact.
#[derive(Debug)]
pub struct ArtifactReader {
    artifact: ArtifactRef,
    file: File,
    _lease: ArtifactLease,
}

impl ArtifactReader {
    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }
}

impl AsyncRead for ArtifactReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}

/// Scratch directory an extractor writes into. Removed on drop.
#[derive(Debug)]
pub struct EncodeSink {
    dir: PathBuf,
}

impl EncodeSink {
    /// Wraps an existing directory (used by tests and ad-hoc tools).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for EncodeSink {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove scratch directory {:?}: {}", self.dir, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::open(StorageConfig::default().with_root(dir.path()))
            .await
            .unwrap()
    }

    async fn read_all(mut reader: ArtifactReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_put_stream_and_open_reader() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let artifact = store
            .put_stream(&b"hello world"[..], "My Clip", MediaKind::Video, "mp4")
            .await
            .unwrap();

        assert_eq!(artifact.size_bytes, 11);
        assert_eq!(artifact.display_name, "My Clip.mp4");
        assert_eq!(artifact.container, "mp4");

        let reader = store.open_reader(artifact.handle.as_str()).await.unwrap();
        assert_eq!(reader.artifact().handle, artifact.handle);
        assert_eq!(read_all(reader).await, b"hello world");
    }

    #[tokio::test]
    async fn test_storage_path_ignores_display_name() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let artifact = store
            .put_stream(&b"x"[..], "../../escape", MediaKind::Audio, "mp3")
            .await
            .unwrap();

        let payload = dir.path().join("objects").join(artifact.handle.as_str());
        assert!(payload.exists());
        assert!(!dir.path().join("escape.mp3").exists());
        assert_eq!(artifact.display_name, "escape.mp3");
    }

    #[tokio::test]
    async fn test_put_file_moves_into_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        let sink = store.scratch().await.unwrap();
        let source = sink.dir().join("media.MP3");
        tokio::fs::write(&source, b"id3data").await.unwrap();

        let artifact = store
            .put_file(&source, "Song", MediaKind::Audio)
            .await
            .unwrap();

        assert_eq!(artifact.container, "mp3");
        assert_eq!(artifact.size_bytes, 7);
        assert!(!source.exists());

        let scratch_dir = sink.dir().to_path_buf();
        drop(sink);
        assert!(!scratch_dir.exists());
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal_and_unknown() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;
        tokio::fs::write(dir.path().join("secret"), b"top secret")
            .await
            .unwrap();

        assert!(matches!(
            store.resolve("../secret"),
            Err(StoreError::InvalidHandle(_))
        ));
        assert!(matches!(
            store.resolve("/etc/passwd"),
            Err(StoreError::InvalidHandle(_))
        ));
        assert!(matches!(
            store.open_reader("../secret").await,
            Err(StoreError::InvalidHandle(_))
        ));

        let never_issued = ArtifactHandle::generate();
        assert!(matches!(
            store.resolve(never_issued.as_str()),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.open_reader(never_issued.as_str()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_staged_file_is_not_served() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir).await;

        // A payload that exists on disk but was never published.
        let handle = ArtifactHandle::generate();
        tokio::fs::write(dir.path().join("staging").join(format!("{handle}.part")), b"partial")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("objects").join(handle.as_str()), b"partial")
            .await
            .unwrap();

        assert!(matches!(
            store.open_reader(handle.as_str()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_expired() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(
            StorageConfig::default()
                .with_root(dir.path())
                .with_retention_secs(60),
        )
        .await
        .unwrap();

        let artifact = store
            .put_stream(&b"data"[..], "old", MediaKind::Video, "mp4")
            .await
            .unwrap();

        let report = store.sweep(Utc::now()).await;
        assert!(report.removed.is_empty());

        let report = store.sweep(Utc::now() + ChronoDuration::seconds(61)).await;
        assert_eq!(report.removed, vec![artifact.handle.clone()]);
        assert!(!dir.path().join("objects").join(artifact.handle.as_str()).exists());
        assert!(matches!(
            store.resolve(artifact.handle.as_str()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_skips_leased_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(
            StorageConfig::default()
                .with_root(dir.path())
                .with_retention_secs(0),
        )
        .await
        .unwrap();

        let artifact = store
            .put_stream(&b"streaming body"[..], "busy", MediaKind::Video, "mp4")
            .await
            .unwrap();

        let reader = store.open_reader(artifact.handle.as_str()).await.unwrap();
        assert_eq!(store.stats().open_readers, 1);

        let report = store.sweep(Utc::now() + ChronoDuration::seconds(1)).await;
        assert!(report.removed.is_empty());
        assert_eq!(report.skipped_leased, 1);

        // The reader still gets every byte.
        assert_eq!(read_all(reader).await, b"streaming body");
        assert_eq!(store.stats().open_readers, 0);

        let report = store.sweep(Utc::now() + ChronoDuration::seconds(1)).await;
        assert_eq!(report.removed.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_rebuilds_index() {
        let dir = TempDir::new().unwrap();
        let artifact = {
            let store = store_in(&dir).await;
            store
                .put_stream(&b"persisted"[..], "keep me", MediaKind::Audio, "mp3")
                .await
                .unwrap()
        };

        // Orphan payload with no sidecar: never published.
        let orphan = ArtifactHandle::generate();
        tokio::fs::write(dir.path().join("objects").join(orphan.as_str()), b"junk")
            .await
            .unwrap();

        let store = store_in(&dir).await;
        let resolved = store.resolve(artifact.handle.as_str()).unwrap();
        assert_eq!(resolved, artifact);
        assert!(store.resolve(orphan.as_str()).is_err());
        assert!(!dir.path().join("objects").join(orphan.as_str()).exists());
        assert_eq!(store.stats().artifacts, 1);
    }
}

//! In-memory document buffers persisted under a root directory
//!
//! Acts as the host for the scheduler: it answers state queries and performs
//! the actual saves. Buffers are addressed by paths relative to the root;
//! untitled buffers (`untitled:<name>`) are written to
//! `.autosave/untitled/<name>`.

use async_trait::async_trait;
use autosave_core::{DocumentSnapshot, ResourceKey};
use dashmap::DashMap;
use scheduler::{DocumentHost, HostError, SaveError, SaveExecutor};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const UNTITLED_PREFIX: &str = "untitled:";

/// Suffix for each write's temp file, so overlapping saves of one document never share one
static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
struct Buffer {
    text: String,
    dirty: bool,
    /// Bumped on every edit so a save only clears the edits it wrote
    version: u64,
}

/// Open documents keyed by location
pub struct BufferStore {
    root: PathBuf,
    buffers: DashMap<ResourceKey, Buffer>,
}

impl BufferStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffers: DashMap::new(),
        }
    }

    /// Open a document whose text matches what is on disk
    pub fn open(&self, location: &str, text: &str) -> ResourceKey {
        let key = ResourceKey::new(location);
        self.buffers.insert(
            key.clone(),
            Buffer {
                text: text.to_string(),
                dirty: false,
                version: 0,
            },
        );
        key
    }

    /// Replace a document's text, opening it if needed, and mark it dirty
    pub fn edit(&self, location: &str, text: &str) -> ResourceKey {
        let key = ResourceKey::new(location);
        let mut buffer = self.buffers.entry(key.clone()).or_insert(Buffer {
            text: String::new(),
            dirty: false,
            version: 0,
        });
        buffer.text = text.to_string();
        buffer.dirty = true;
        buffer.version += 1;
        key
    }

    /// Release a document; returns false if it was not open
    pub fn close(&self, key: &ResourceKey) -> bool {
        self.buffers.remove(key).is_some()
    }

    /// Where a document is persisted
    pub fn target_path(&self, key: &ResourceKey) -> Result<PathBuf, SaveError> {
        if let Some(name) = key.as_str().strip_prefix(UNTITLED_PREFIX) {
            let relative = normalize_path(Path::new(name))?;
            return Ok(self.root.join(".autosave/untitled").join(relative));
        }

        let relative = normalize_path(Path::new(key.as_str()))?;
        Ok(self.root.join(relative))
    }
}

impl DocumentHost for BufferStore {
    fn snapshot(&self, key: &ResourceKey) -> Result<DocumentSnapshot, HostError> {
        let buffer = self
            .buffers
            .get(key)
            .ok_or_else(|| HostError::NotFound(key.clone()))?;
        Ok(DocumentSnapshot::from_text(key.clone(), &buffer.text, buffer.dirty))
    }

    fn dirty_documents(&self) -> Vec<DocumentSnapshot> {
        let mut dirty: Vec<DocumentSnapshot> = self
            .buffers
            .iter()
            .filter(|entry| entry.value().dirty)
            .map(|entry| DocumentSnapshot::from_text(entry.key().clone(), &entry.value().text, true))
            .collect();
        dirty.sort_by(|a, b| a.key.cmp(&b.key));
        dirty
    }
}

#[async_trait]
impl SaveExecutor for BufferStore {
    async fn save(&self, key: &ResourceKey) -> Result<(), SaveError> {
        let (text, version) = match self.buffers.get(key) {
            Some(buffer) if buffer.dirty => (buffer.text.clone(), buffer.version),
            // Closed or already clean: nothing to write
            _ => return Ok(()),
        };

        let path = self.target_path(key)?;
        atomic_write(&path, text.as_bytes())
            .await
            .map_err(|e| SaveError::Failed(format!("{}: {}", path.display(), e)))?;

        if let Some(mut buffer) = self.buffers.get_mut(key) {
            if buffer.version == version {
                buffer.dirty = false;
            }
        }

        debug!("Wrote {} bytes to {}", text.len(), path.display());
        Ok(())
    }
}

/// Atomic write helper
///
/// Writes data to a uniquely named temporary file next to the target, fsyncs
/// it, then renames it over the target path. Concurrent writes to the same
/// target each succeed; the last rename wins.
pub async fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;

    tokio::fs::create_dir_all(parent).await?;

    let sequence = TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let tmp_path = parent.join(format!(
        ".{}.{}-{}.autosave-tmp",
        name,
        std::process::id(),
        sequence
    ));
    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

/// Normalize a document path for storage
///
/// - Rejects `..` and absolute paths
/// - Removes `./` components
fn normalize_path(path: &Path) -> Result<PathBuf, SaveError> {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => {
                return Err(SaveError::Failed(format!(
                    "refusing to write outside the workspace: {}",
                    path.display()
                )))
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(SaveError::Failed("empty document path".to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_edit_marks_dirty() {
        let store = BufferStore::new("/tmp");
        let key = store.open("a.txt", "hello");
        assert!(!store.snapshot(&key).unwrap().is_dirty);
        assert!(store.dirty_documents().is_empty());

        store.edit("a.txt", "hello world");
        let snap = store.snapshot(&key).unwrap();
        assert!(snap.is_dirty);
        assert_eq!(snap.size_bytes, 11);
        assert_eq!(store.dirty_documents().len(), 1);
    }

    #[test]
    fn test_closed_buffer_is_not_found() {
        let store = BufferStore::new("/tmp");
        let key = store.edit("a.txt", "x");
        assert!(store.close(&key));
        assert!(!store.close(&key));
        assert_eq!(store.snapshot(&key), Err(HostError::NotFound(key)));
    }

    #[test]
    fn test_target_path() {
        let store = BufferStore::new("/work");
        assert_eq!(
            store.target_path(&ResourceKey::new("./src/a.rs")).unwrap(),
            PathBuf::from("/work/src/a.rs")
        );
        assert_eq!(
            store.target_path(&ResourceKey::new("untitled:Untitled-1")).unwrap(),
            PathBuf::from("/work/.autosave/untitled/Untitled-1")
        );
        assert!(store.target_path(&ResourceKey::new("../escape.txt")).is_err());
        assert!(store.target_path(&ResourceKey::new("/etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_save_writes_file_and_marks_clean() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());
        let key = store.edit("notes/today.md", "# Today");

        store.save(&key).await.unwrap();

        let written = std::fs::read_to_string(temp_dir.path().join("notes/today.md")).unwrap();
        assert_eq!(written, "# Today");
        assert!(!store.snapshot(&key).unwrap().is_dirty);
        assert!(leftover_temp_files(&temp_dir.path().join("notes")).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_saves_both_succeed() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());
        let key = store.edit("a.txt", &"a".repeat(50_000));

        let first = store.save(&key);
        store.edit("a.txt", &"b".repeat(50_000));
        let second = store.save(&key);
        let (r1, r2) = tokio::join!(first, second);

        assert!(r1.is_ok(), "first save failed: {:?}", r1);
        assert!(r2.is_ok(), "second save failed: {:?}", r2);
        let written = std::fs::read_to_string(temp_dir.path().join("a.txt")).unwrap();
        assert_eq!(written.len(), 50_000);
        assert!(written.chars().all(|c| c == 'b'));
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_atomic_writes_to_one_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("shared.txt");

        let writes = (0..8).map(|i| {
            let target = target.clone();
            tokio::spawn(async move { atomic_write(&target, format!("v{}", i).as_bytes()).await })
        });
        for write in writes.collect::<Vec<_>>() {
            write.await.unwrap().unwrap();
        }

        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with('v'));
        assert!(leftover_temp_files(temp_dir.path()).is_empty());
    }

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().ends_with(".autosave-tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_save_of_clean_or_missing_buffer_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());
        let key = store.open("a.txt", "on disk");

        store.save(&key).await.unwrap();
        store.save(&ResourceKey::new("missing.txt")).await.unwrap();
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        // A file where a directory is needed makes the write fail
        std::fs::write(temp_dir.path().join("blocker"), "").unwrap();
        let store = BufferStore::new(temp_dir.path());
        let key = store.edit("blocker/a.txt", "x");

        let err = store.save(&key).await.unwrap_err();
        assert!(matches!(err, SaveError::Failed(_)));
        assert!(store.snapshot(&key).unwrap().is_dirty);
    }
}

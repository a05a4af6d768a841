//! File-backed recipient list.
//!
//! The list is one JSON array of ids. Every access takes two locks in order:
//! an in-process async mutex (so tasks of this process queue instead of
//! polling) and an OS advisory lock on a sibling `<file>.lock` (so other
//! processes sharing the file cannot interleave a read-modify-write cycle).
//! Both waits share a single deadline.

use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions, TryLockError},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex as StdMutex,
    time::Duration,
};

use tokio::{
    sync::{Mutex, MutexGuard},
    time::{sleep, timeout_at, Instant},
};
use tracing::{debug, warn};

use crate::{domain::Recipient, errors::Error, Result};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);
const LOCK_SUFFIX: &str = ".lock";
const TEMP_SUFFIX: &str = ".tmp";

pub struct RecipientStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    local: Mutex<()>,
    last_good: StdMutex<Vec<Recipient>>,
}

/// Holds both locks; dropping it releases them on every exit path.
struct StoreGuard<'a> {
    _local: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for StoreGuard<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl RecipientStore {
    pub fn new(path: impl Into<PathBuf>, lock_timeout: Duration) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, LOCK_SUFFIX);
        Self {
            path,
            lock_path,
            lock_timeout,
            local: Mutex::new(()),
            last_good: StdMutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current list, in insertion order. A store that was never written is empty.
    pub async fn snapshot(&self) -> Result<Vec<Recipient>> {
        let _guard = self.lock().await?;
        let ids = self.read_ids()?;
        self.remember(&ids);
        Ok(ids)
    }

    /// Like [`snapshot`](Self::snapshot), but falls back to the last list that
    /// was read or written successfully. The flag is `true` for a stale list.
    pub async fn snapshot_or_cached(&self) -> (Vec<Recipient>, bool) {
        match self.snapshot().await {
            Ok(ids) => (ids, false),
            Err(e) => {
                let cached = self.cached();
                warn!(
                    store = %self.path.display(),
                    cached = cached.len(),
                    "using cached recipients: {e}"
                );
                (cached, true)
            }
        }
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.snapshot().await?.len())
    }

    pub async fn contains(&self, id: Recipient) -> Result<bool> {
        Ok(self.snapshot().await?.contains(&id))
    }

    /// Appends `id` unless present. Returns whether the store changed.
    pub async fn add(&self, id: Recipient) -> Result<bool> {
        self.update(|ids| {
            if ids.contains(&id) {
                return false;
            }
            ids.push(id);
            true
        })
        .await
    }

    /// Removes `id` if present. Returns whether the store changed.
    pub async fn remove(&self, id: Recipient) -> Result<bool> {
        self.update(|ids| {
            let before = ids.len();
            ids.retain(|x| *x != id);
            ids.len() != before
        })
        .await
    }

    /// Removes every id in `remove` within one critical section and at most
    /// one write. Returns how many entries were dropped.
    pub async fn batch_remove(&self, remove: &HashSet<Recipient>) -> Result<usize> {
        if remove.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock().await?;
        let mut ids = self.read_ids()?;
        let before = ids.len();
        ids.retain(|x| !remove.contains(x));
        let removed = before - ids.len();
        if removed > 0 {
            self.write_ids(&ids)?;
        }
        self.remember(&ids);
        Ok(removed)
    }

    fn cached(&self) -> Vec<Recipient> {
        self.last_good
            .lock()
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    fn remember(&self, ids: &[Recipient]) {
        if let Ok(mut cached) = self.last_good.lock() {
            *cached = ids.to_vec();
        }
    }

    async fn update(&self, apply: impl FnOnce(&mut Vec<Recipient>) -> bool) -> Result<bool> {
        let _guard = self.lock().await?;
        let mut ids = self.read_ids()?;
        let changed = apply(&mut ids);
        if changed {
            self.write_ids(&ids)?;
        }
        self.remember(&ids);
        Ok(changed)
    }

    async fn lock(&self) -> Result<StoreGuard<'_>> {
        let deadline = Instant::now() + self.lock_timeout;

        let Ok(local) = timeout_at(deadline, self.local.lock()).await else {
            warn!(store = %self.path.display(), "timed out waiting for in-process store lock");
            return Err(self.unavailable("timed out waiting for in-process lock"));
        };

        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.unavailable(e))?;

        loop {
            match file.try_lock() {
                Ok(()) => {
                    return Ok(StoreGuard {
                        _local: local,
                        file,
                    })
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        warn!(
                            lock = %self.lock_path.display(),
                            timeout_ms = self.lock_timeout.as_millis() as u64,
                            "timed out waiting for store file lock"
                        );
                        return Err(self.unavailable("timed out waiting for file lock"));
                    }
                    sleep(LOCK_POLL_INTERVAL).await;
                }
                Err(TryLockError::Error(e)) => return Err(self.unavailable(e)),
            }
        }
    }

    /// Must be called with the lock held.
    fn read_ids(&self) -> Result<Vec<Recipient>> {
        let txt = match fs::read_to_string(&self.path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };
        if txt.trim().is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Recipient> = serde_json::from_str(&txt).map_err(|e| self.unavailable(e))?;
        let mut seen = HashSet::with_capacity(raw.len());
        let ids: Vec<Recipient> = raw.into_iter().filter(|id| seen.insert(*id)).collect();
        Ok(ids)
    }

    /// Must be called with the lock held. Replaces the file atomically.
    fn write_ids(&self, ids: &[Recipient]) -> Result<()> {
        let tmp = sibling(&self.path, TEMP_SUFFIX);
        let bytes = serde_json::to_vec(ids).map_err(|e| self.unavailable(e))?;
        fs::write(&tmp, bytes).map_err(|e| self.unavailable(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.unavailable(e))?;
        debug!(store = %self.path.display(), count = ids.len(), "recipient store saved");
        Ok(())
    }

    fn unavailable(&self, reason: impl ToString) -> Error {
        Error::store_unavailable(&self.path, reason)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    static SEQ: AtomicUsize = AtomicUsize::new(0);

    pub(crate) fn tmp_store_path(prefix: &str) -> PathBuf {
        let n = SEQ.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        let dir = PathBuf::from(format!("/tmp/{prefix}-{pid}-{n}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir.join("recipients.json")
    }

    fn ids(raw: &[i64]) -> Vec<Recipient> {
        raw.iter().copied().map(Recipient).collect()
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let store = RecipientStore::new(tmp_store_path("relay-store-empty"), DEFAULT_LOCK_TIMEOUT);
        assert!(store.snapshot().await.unwrap().is_empty());
        assert_eq!(store.len().await.unwrap(), 0);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn add_is_idempotent_and_persisted() {
        let path = tmp_store_path("relay-store-add");
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        assert!(store.add(Recipient(-100)).await.unwrap());
        assert!(!store.add(Recipient(-100)).await.unwrap());
        assert!(store.add(Recipient(42)).await.unwrap());
        assert!(!store.add(Recipient(-100)).await.unwrap());

        assert_eq!(store.snapshot().await.unwrap(), ids(&[-100, 42]));
        assert!(store.contains(Recipient(42)).await.unwrap());
        assert!(!store.contains(Recipient(7)).await.unwrap());

        let on_disk: Vec<i64> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec![-100, 42]);
        assert!(!sibling(&path, TEMP_SUFFIX).exists());
    }

    #[tokio::test]
    async fn remove_missing_id_is_a_noop() {
        let path = tmp_store_path("relay-store-remove");
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        assert!(!store.remove(Recipient(7)).await.unwrap());
        assert!(!path.exists());

        store.add(Recipient(7)).await.unwrap();
        store.add(Recipient(8)).await.unwrap();
        assert!(store.remove(Recipient(7)).await.unwrap());
        assert_eq!(store.snapshot().await.unwrap(), ids(&[8]));
    }

    #[tokio::test]
    async fn batch_remove_keeps_others_in_order() {
        let path = tmp_store_path("relay-store-batch");
        fs::write(&path, "[-1, 2, -3, 4, -5, 6]").unwrap();
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        let purge: HashSet<Recipient> = ids(&[2, -5, 99]).into_iter().collect();
        assert_eq!(store.batch_remove(&purge).await.unwrap(), 2);

        let snap = store.snapshot().await.unwrap();
        assert_eq!(snap, ids(&[-1, -3, 4, 6]));
        assert!(purge.iter().all(|id| !snap.contains(id)));
    }

    #[tokio::test]
    async fn batch_remove_without_matches_does_not_write() {
        let path = tmp_store_path("relay-store-batch-noop");
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        let purge: HashSet<Recipient> = ids(&[1, 2]).into_iter().collect();
        assert_eq!(store.batch_remove(&purge).await.unwrap(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn duplicates_on_disk_are_collapsed() {
        let path = tmp_store_path("relay-store-dupes");
        fs::write(&path, "[5, -1, 5, 3, -1]").unwrap();
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        assert_eq!(store.snapshot().await.unwrap(), ids(&[5, -1, 3]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_from_two_handles_are_not_lost() {
        let path = tmp_store_path("relay-store-concurrent");
        // Two independent handles: they only coordinate through the file lock.
        let a = Arc::new(RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT));
        let b = Arc::new(RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT));

        let ta = tokio::spawn(async move {
            for i in 0..25 {
                a.add(Recipient(-(i + 1))).await.unwrap();
            }
        });
        let tb = tokio::spawn(async move {
            for i in 0..25 {
                b.add(Recipient(i + 1)).await.unwrap();
            }
        });
        ta.await.unwrap();
        tb.await.unwrap();

        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);
        let snap = store.snapshot().await.unwrap();
        assert_eq!(snap.len(), 50);
        for i in 1..=25 {
            assert!(snap.contains(&Recipient(i)));
            assert!(snap.contains(&Recipient(-i)));
        }
    }

    #[tokio::test]
    async fn lock_timeout_reports_unavailable_and_falls_back_to_cache() {
        let path = tmp_store_path("relay-store-timeout");
        let store = RecipientStore::new(&path, Duration::from_millis(100));
        store.add(Recipient(-10)).await.unwrap();
        store.add(Recipient(20)).await.unwrap();

        // Another "process" holds the file lock.
        let holder = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(sibling(&path, LOCK_SUFFIX))
            .unwrap();
        holder.lock().unwrap();

        let err = store.snapshot().await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }), "got {err}");
        assert!(store.add(Recipient(30)).await.is_err());

        let (cached, stale) = store.snapshot_or_cached().await;
        assert!(stale);
        assert_eq!(cached, ids(&[-10, 20]));

        holder.unlock().unwrap();
        let (fresh, stale) = store.snapshot_or_cached().await;
        assert!(!stale);
        assert_eq!(fresh, ids(&[-10, 20]));
    }

    #[tokio::test]
    async fn corrupt_file_is_unavailable_and_never_overwritten() {
        let path = tmp_store_path("relay-store-corrupt");
        fs::write(&path, "{not json").unwrap();
        let store = RecipientStore::new(&path, DEFAULT_LOCK_TIMEOUT);

        assert!(matches!(
            store.snapshot().await,
            Err(Error::StoreUnavailable { .. })
        ));
        assert!(store.add(Recipient(1)).await.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{not json");
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::ALBUMS_PREFIX;
use library::FolderMapping;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::store::{ObjectSource, StoreError};

/// An immutable, fully built mapping plus the time it was listed.
#[derive(Debug)]
pub struct MappingSnapshot {
    pub mapping: FolderMapping,
    pub refreshed_at: Instant,
}

impl MappingSnapshot {
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.refreshed_at)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

impl CacheState {
    pub fn label(self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Fresh => "fresh",
            CacheState::Stale => "stale",
        }
    }
}

/// Process-wide (artist, album) -> folder cache, rebuilt from a full listing.
///
/// Readers get an `Arc` to a complete snapshot. A stale or empty cache is rebuilt on
/// the next read; concurrent readers wait on one rebuild instead of each listing the
/// bucket. No lock is held while the listing is in flight except the rebuild gate.
pub struct FolderMappingCache {
    source: Arc<dyn ObjectSource>,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<MappingSnapshot>>>,
    rebuild_gate: Mutex<()>,
    epoch: AtomicU64,
}

impl FolderMappingCache {
    pub fn new(source: Arc<dyn ObjectSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(None),
            rebuild_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a fresh snapshot, rebuilding first when the cache is empty or stale.
    ///
    /// A failed rebuild is returned as an error and leaves the previous snapshot in
    /// place for `last_known`.
    pub async fn get_mapping(&self) -> Result<Arc<MappingSnapshot>, StoreError> {
        if let Some(snapshot) = self.fresh_snapshot() {
            return Ok(snapshot);
        }

        let _gate = self.rebuild_gate.lock().await;
        if let Some(snapshot) = self.fresh_snapshot() {
            debug!("folder mapping rebuilt by a concurrent request");
            return Ok(snapshot);
        }

        let epoch = self.epoch();
        let started = Instant::now();
        let objects = match self.source.list_all(ALBUMS_PREFIX).await {
            Ok(objects) => objects,
            Err(err) => {
                warn!("Folder mapping rebuild failed: {}", err);
                return Err(err);
            }
        };
        let mapping = FolderMapping::from_keys(objects.iter().map(|entry| entry.key.as_str()));
        info!(
            "Folder mapping rebuilt: {} folders from {} objects in {:?}",
            mapping.len(),
            objects.len(),
            started.elapsed()
        );

        let snapshot = Arc::new(MappingSnapshot {
            mapping,
            refreshed_at: Instant::now(),
        });
        if !self.install(epoch, &snapshot) {
            debug!("folder mapping invalidated during rebuild; result not cached");
        }
        Ok(snapshot)
    }

    /// Invalidation counter. Read it before a listing and hand it to `prime_if`.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Installs a mapping built elsewhere from a complete listing that started at
    /// `epoch`. Returns false and leaves the cache alone when it was invalidated since.
    pub fn prime_if(&self, epoch: u64, mapping: FolderMapping) -> bool {
        let snapshot = Arc::new(MappingSnapshot {
            mapping,
            refreshed_at: Instant::now(),
        });
        let installed = self.install(epoch, &snapshot);
        if !installed {
            debug!("folder mapping invalidated during listing; primed mapping dropped");
        }
        installed
    }

    fn install(&self, epoch: u64, snapshot: &Arc<MappingSnapshot>) -> bool {
        // Checked under the write lock so an invalidate cannot slip in between.
        let mut guard = self.snapshot.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        *guard = Some(Arc::clone(snapshot));
        true
    }

    /// The most recent snapshot regardless of age.
    pub fn last_known(&self) -> Option<Arc<MappingSnapshot>> {
        self.snapshot.read().clone()
    }

    /// Drops the cached mapping; the next read rebuilds.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *self.snapshot.write() = None;
        info!("Folder mapping cache invalidated");
    }

    pub fn state(&self) -> CacheState {
        match self.snapshot.read().as_ref() {
            None => CacheState::Empty,
            Some(snapshot) if self.is_fresh(snapshot) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    fn fresh_snapshot(&self) -> Option<Arc<MappingSnapshot>> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref()?;
        if self.is_fresh(snapshot) {
            Some(Arc::clone(snapshot))
        } else {
            None
        }
    }

    fn is_fresh(&self, snapshot: &MappingSnapshot) -> bool {
        !snapshot.mapping.is_empty() && snapshot.age() <= self.ttl
    }
}

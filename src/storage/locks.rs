//! Per-apiId structural locks
//!
//! Record operations hold a shared guard for their whole duration; storage
//! creation, migration and drop hold the exclusive guard. A drop retires the
//! entry: operations that were queued behind it wake up to `NotFound`
//! instead of running against a table that no longer exists.

use crate::error::{ContentError, Result};
use crate::registry::ApiId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct LockState {
    retired: bool,
}

type LockEntry = Arc<RwLock<LockState>>;

pub struct StorageLocks {
    entries: DashMap<ApiId, LockEntry>,
    timeout: Duration,
}

/// Shared guard held by a record operation
pub struct RecordGuard {
    _guard: OwnedRwLockReadGuard<LockState>,
}

/// Exclusive guard held by a structural change
pub struct StructuralGuard {
    api_id: ApiId,
    entry: LockEntry,
    guard: OwnedRwLockWriteGuard<LockState>,
}

impl StructuralGuard {
    pub fn api_id(&self) -> &ApiId {
        &self.api_id
    }
}

impl StorageLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
        }
    }

    fn entry(&self, api_id: &ApiId) -> LockEntry {
        self.entries.entry(api_id.clone()).or_default().clone()
    }

    fn busy(api_id: &ApiId) -> ContentError {
        ContentError::conflict(format!(
            "Content type '{}' is being modified, retry the request",
            api_id
        ))
    }

    /// Acquire the shared guard for a record operation
    pub async fn read(&self, api_id: &ApiId) -> Result<RecordGuard> {
        let entry = self.entry(api_id);

        let guard = tokio::time::timeout(self.timeout, entry.read_owned())
            .await
            .map_err(|_| Self::busy(api_id))?;

        if guard.retired {
            debug!("Record operation on {} found its storage dropped", api_id);
            return Err(ContentError::content_type_not_found(api_id.as_str()));
        }

        Ok(RecordGuard { _guard: guard })
    }

    /// Acquire the exclusive guard for a structural change
    pub async fn write(&self, api_id: &ApiId) -> Result<StructuralGuard> {
        loop {
            let entry = self.entry(api_id);

            let guard = tokio::time::timeout(self.timeout, entry.clone().write_owned())
                .await
                .map_err(|_| Self::busy(api_id))?;

            // A retired entry was already replaced in the table; take the new one
            if guard.retired {
                continue;
            }

            return Ok(StructuralGuard {
                api_id: api_id.clone(),
                entry,
                guard,
            });
        }
    }

    /// Mark the storage behind `guard` as gone and release it
    pub fn retire(&self, mut guard: StructuralGuard) {
        guard.guard.retired = true;
        self.entries
            .remove_if(&guard.api_id, |_, current| Arc::ptr_eq(current, &guard.entry));
        debug!("Retired storage lock for {}", guard.api_id);
    }

    /// Forget the entry of an apiId nobody holds or waits on, so lookups of
    /// unknown apiIds do not accumulate entries
    pub fn discard_idle(&self, api_id: &ApiId) {
        self.entries
            .remove_if(api_id, |_, entry| Arc::strong_count(entry) == 1);
    }

    pub fn tracked(&self) -> usize {
        self.entries.len()
    }
}

impl Default for StorageLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

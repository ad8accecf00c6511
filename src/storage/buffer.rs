//! Buffer pool: bounded page cache, LRU eviction, and the page lock table.
//!
//! Every component that touches a page goes through [`BufferPool::get_page`]
//! with a transaction id and the permission it needs. The pool serves cached
//! pages, reads cold ones through the owning heap file (evicting the least
//! recently used page when full), and enforces shared/exclusive page locking
//! before handing a page out. The cache map, recency order, and dirty flags
//! are guarded by one internal mutex; the lock table blocks callers on its
//! own condition variable so lock waits never hold the cache mutex.

pub mod lock_table;
pub mod lru;

use crate::access::tuple::Tuple;
use crate::catalog::{Catalog, TableId};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, PageId};
use crate::storage::DEFAULT_POOL_CAPACITY;
use crate::transaction::TransactionId;
use lock_table::LockTable;
use log::debug;
use lru::LruList;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

pub use lock_table::{LockMode, Permissions};

/// Shared handle to a cached page. Holding one is a logical checkout: the
/// pool may flush or drop its cache entry while handles are still live.
pub type PageHandle = Arc<RwLock<HeapPage>>;

struct CacheEntry {
    page: PageHandle,
    /// Transaction that last dirtied the page, if its in-memory content has
    /// diverged from disk.
    dirty: Option<TransactionId>,
}

#[derive(Default)]
struct PoolState {
    cache: HashMap<PageId, CacheEntry>,
    recency: LruList,
}

pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    state: Mutex<PoolState>,
    locks: LockTable,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_capacity(catalog, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(catalog: Arc<Catalog>, capacity: usize) -> Self {
        Self {
            capacity,
            catalog,
            state: Mutex::new(PoolState::default()),
            locks: LockTable::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetches a page on behalf of `tid`, blocking until the page lock
    /// implied by `perm` can be granted. The lock is validated on every call,
    /// cache hit or miss.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> StorageResult<PageHandle> {
        self.locks.acquire(tid, pid, perm)?;

        let mut state = self.state.lock();
        if let Some(entry) = state.cache.get(&pid) {
            let handle = Arc::clone(&entry.page);
            state.recency.touch(pid);
            return Ok(handle);
        }

        if state.cache.len() >= self.capacity {
            self.evict_locked(&mut state)?;
        }

        let file = self.catalog.table(pid.table)?;
        let page = file.read_page(pid)?;
        let handle: PageHandle = Arc::new(RwLock::new(page));
        state.cache.insert(
            pid,
            CacheEntry {
                page: Arc::clone(&handle),
                dirty: None,
            },
        );
        state.recency.touch(pid);
        Ok(handle)
    }

    /// Drops `tid`'s lock on `pid` unconditionally.
    ///
    /// Calling this outside a protocol that guarantees the lock is no longer
    /// needed (e.g. mid-transaction under two-phase locking) can break
    /// isolation for the enclosing transaction.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.holds_lock(tid, pid)
    }

    /// Releases every lock `tid` holds. Equivalent to committing in this
    /// minimal form.
    pub fn transaction_complete(&self, tid: TransactionId) {
        self.transaction_complete_with(tid, true);
    }

    /// Commit/abort-aware completion. The `commit` flag is an extension
    /// point for a recovery collaborator; the core only releases locks.
    pub fn transaction_complete_with(&self, tid: TransactionId, _commit: bool) {
        self.locks.release_all(tid);
    }

    /// Aborts a `get_page` call by `tid` that is blocked on a lock, making it
    /// fail with `TransactionAborted`. No lock state is left behind.
    pub fn abort_waiting(&self, tid: TransactionId) {
        debug!("aborting lock wait of {}", tid);
        self.locks.abort_waiter(tid);
    }

    /// Inserts `tuple` into `table` on behalf of `tid`, then re-caches every
    /// mutated page (marked dirty by `tid`) so later readers see the
    /// mutation without a disk round trip.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table: TableId,
        tuple: Tuple,
    ) -> StorageResult<()> {
        let file = self.catalog.table(table)?;
        let mutated = file.insert_tuple(self, tid, tuple)?;
        self.recache_dirty(tid, mutated)
    }

    /// Deletes `tuple` from the table its record id names, re-caching the
    /// mutated page as dirty.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::TupleNotFound)?;
        let file = self.catalog.table(rid.page_id.table)?;
        let mutated = file.delete_tuple(self, tid, tuple)?;
        self.recache_dirty(tid, mutated)
    }

    fn recache_dirty(&self, tid: TransactionId, pages: Vec<PageHandle>) -> StorageResult<()> {
        let mut state = self.state.lock();
        for handle in pages {
            let pid = handle.read().id();
            if !state.cache.contains_key(&pid) && state.cache.len() >= self.capacity {
                self.evict_locked(&mut state)?;
            }
            state.cache.insert(
                pid,
                CacheEntry {
                    page: handle,
                    dirty: Some(tid),
                },
            );
            state.recency.touch(pid);
        }
        Ok(())
    }

    /// Writes one cached page to disk if it is dirty. No-op otherwise.
    pub fn flush_page(&self, pid: PageId) -> StorageResult<()> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state, pid)
    }

    /// Flushes every dirty cached page, regardless of owner.
    pub fn flush_all_pages(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        let pids: Vec<PageId> = state.cache.keys().copied().collect();
        for pid in pids {
            self.flush_locked(&mut state, pid)?;
        }
        Ok(())
    }

    /// Flushes only the cached pages last dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> StorageResult<()> {
        let mut state = self.state.lock();
        let pids: Vec<PageId> = state
            .cache
            .iter()
            .filter(|(_, entry)| entry.dirty == Some(tid))
            .map(|(pid, _)| *pid)
            .collect();
        for pid in pids {
            self.flush_locked(&mut state, pid)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without flushing. Used by a recovery
    /// collaborator rolling back a transaction.
    pub fn discard_page(&self, pid: PageId) {
        let mut state = self.state.lock();
        state.cache.remove(&pid);
        state.recency.remove(pid);
    }

    fn flush_locked(&self, state: &mut PoolState, pid: PageId) -> StorageResult<()> {
        if let Some(entry) = state.cache.get_mut(&pid) {
            if entry.dirty.is_some() {
                let file = self.catalog.table(pid.table)?;
                file.write_page(&entry.page.read())?;
                entry.dirty = None;
            }
        }
        Ok(())
    }

    /// Evicts the least recently used page, flushing it first if dirty. A
    /// flush failure surfaces as `BufferPoolFull` wrapping the I/O cause and
    /// leaves the page cached.
    fn evict_locked(&self, state: &mut PoolState) -> StorageResult<()> {
        let pid = state
            .recency
            .pop_lru()
            .ok_or(StorageError::BufferPoolFull { cause: None })?;

        if let Err(e) = self.flush_locked(state, pid) {
            state.recency.touch(pid);
            return Err(match e {
                StorageError::Io(cause) => StorageError::BufferPoolFull { cause: Some(cause) },
                other => other,
            });
        }

        state.cache.remove(&pid);
        debug!("evicted page {}", pid);
        Ok(())
    }

    // Cache introspection, used by tests and collaborators.

    pub fn num_cached_pages(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.state.lock().cache.contains_key(&pid)
    }

    /// The transaction that last dirtied `pid`, if the page is cached and
    /// dirty.
    pub fn dirtier(&self, pid: PageId) -> Option<TransactionId> {
        self.state
            .lock()
            .cache
            .get(&pid)
            .and_then(|entry| entry.dirty)
    }
}

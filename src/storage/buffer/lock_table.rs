//! Blocking two-mode page lock table.
//!
//! Tracks, per transaction, the lock mode it holds on each page. Shared is
//! compatible with other Shared holders; Exclusive excludes every other
//! holder. A request that cannot be granted parks the calling thread on a
//! table-wide condition variable that is notified on every release, so the
//! grant check is simply re-run after each wakeup. No arrival-order fairness
//! is guaranteed.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::trace;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};

/// Lock modes a transaction can hold on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Permission a caller requests when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Default)]
struct LockState {
    /// Per-transaction map of held page locks.
    held: HashMap<TransactionId, HashMap<PageId, LockMode>>,
    /// Transactions whose blocked acquisition must fail on next wakeup.
    aborted: HashSet<TransactionId>,
}

#[derive(Debug, Default)]
pub(crate) struct LockTable {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until `tid` can hold `pid` with the mode implied by `perm`,
    /// then records the grant. Locks held by `tid` itself never block it:
    /// a sole Shared holder may upgrade to Exclusive, and a held Exclusive
    /// is never downgraded by a later read request.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> StorageResult<()> {
        let mut state = self.state.lock();
        loop {
            if state.aborted.remove(&tid) {
                return Err(StorageError::TransactionAborted(tid));
            }

            let mut shared_elsewhere = false;
            let mut exclusive_elsewhere = false;
            for (holder, pages) in &state.held {
                if *holder == tid {
                    continue;
                }
                match pages.get(&pid) {
                    Some(LockMode::Exclusive) => exclusive_elsewhere = true,
                    Some(LockMode::Shared) => shared_elsewhere = true,
                    None => {}
                }
            }

            let grantable = match perm {
                Permissions::ReadOnly => !exclusive_elsewhere,
                Permissions::ReadWrite => !exclusive_elsewhere && !shared_elsewhere,
            };

            if grantable {
                let mode = match perm {
                    Permissions::ReadOnly => LockMode::Shared,
                    Permissions::ReadWrite => LockMode::Exclusive,
                };
                let pages = state.held.entry(tid).or_default();
                match pages.get(&pid) {
                    Some(LockMode::Exclusive) => {}
                    _ => {
                        pages.insert(pid, mode);
                    }
                }
                return Ok(());
            }

            trace!("{} blocked waiting for page {}", tid, pid);
            self.released.wait(&mut state);
        }
    }

    /// Drops `tid`'s lock on `pid` unconditionally and wakes waiters.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        if let Some(pages) = state.held.get_mut(&tid) {
            pages.remove(&pid);
            if pages.is_empty() {
                state.held.remove(&tid);
            }
        }
        self.released.notify_all();
    }

    /// Drops every lock `tid` holds and wakes waiters.
    pub fn release_all(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        state.held.remove(&tid);
        state.aborted.remove(&tid);
        self.released.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.state
            .lock()
            .held
            .get(&tid)
            .is_some_and(|pages| pages.contains_key(&pid))
    }

    pub fn mode_of(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.state
            .lock()
            .held
            .get(&tid)
            .and_then(|pages| pages.get(&pid))
            .copied()
    }

    /// Makes a blocked acquisition by `tid` fail with `TransactionAborted`.
    /// The flag is consumed by the waiter or cleared when the transaction
    /// completes.
    pub fn abort_waiter(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        state.aborted.insert(tid);
        self.released.notify_all();
    }
}

use crate::storage::page::PageId;
use std::collections::{HashMap, VecDeque};

/// Access-recency order over cached page ids (least recently used at front).
#[derive(Debug, Default)]
pub struct LruList {
    /// Queue of page ids in access order.
    order: VecDeque<PageId>,
    /// Map to track position in the queue for O(1) lookup on touch/remove.
    positions: HashMap<PageId, usize>,
}

impl LruList {
    pub fn new() -> Self {
        Self::default()
    }

    fn reindex(&mut self) {
        for (idx, &pid) in self.order.iter().enumerate() {
            self.positions.insert(pid, idx);
        }
    }

    /// Marks `pid` most recently used, inserting it if absent.
    pub fn touch(&mut self, pid: PageId) {
        if let Some(&idx) = self.positions.get(&pid) {
            self.order.remove(idx);
        }
        self.order.push_back(pid);
        self.reindex();
    }

    /// Removes `pid` from the recency order entirely.
    pub fn remove(&mut self, pid: PageId) {
        if let Some(idx) = self.positions.remove(&pid) {
            self.order.remove(idx);
            self.reindex();
        }
    }

    /// Pops the least recently used page id, if any.
    pub fn pop_lru(&mut self) -> Option<PageId> {
        let pid = self.order.pop_front()?;
        self.positions.remove(&pid);
        self.reindex();
        Some(pid)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

//! Restartable sequential scan over a heap file's tuples.

use crate::storage::buffer::{BufferPool, Permissions};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::heap_file::HeapFile;
use crate::storage::page::PageId;
use crate::access::tuple::Tuple;
use crate::transaction::TransactionId;
use std::collections::VecDeque;
use std::sync::Arc;

enum ScanState {
    Closed,
    Open {
        /// Next page number to fetch once the buffered tuples run out.
        next_page: u32,
        /// Occupied tuples of the current page, in ascending slot order.
        buffered: VecDeque<Tuple>,
    },
}

/// Cursor over every tuple of a heap file, in ascending (page, slot) order.
///
/// Each page touch goes through the buffer pool under read permission, so a
/// scan obeys the same locking as point reads. The cursor starts `Closed`;
/// `open` primes it at page 0 and `rewind` restarts an open cursor from
/// page 0.
pub struct HeapScan {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    state: ScanState,
}

impl HeapScan {
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            state: ScanState::Closed,
        }
    }

    /// Buffers the occupied tuples of one page fetched through the pool.
    fn load_page(&self, page_no: u32) -> StorageResult<VecDeque<Tuple>> {
        let pid = PageId::new(self.file.id(), page_no);
        let handle = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let page = handle.read();
        Ok(page.iter().cloned().collect())
    }

    pub fn open(&mut self) -> StorageResult<()> {
        let (buffered, next_page) = if self.file.num_pages()? > 0 {
            (self.load_page(0)?, 1)
        } else {
            (VecDeque::new(), 0)
        };
        self.state = ScanState::Open {
            next_page,
            buffered,
        };
        Ok(())
    }

    /// True if another tuple remains, advancing across pages as needed.
    /// Returns `false` on a closed cursor.
    pub fn has_next(&mut self) -> StorageResult<bool> {
        let num_pages = self.file.num_pages()?;
        let ScanState::Open {
            next_page,
            buffered,
        } = &mut self.state
        else {
            return Ok(false);
        };

        while buffered.is_empty() && *next_page < num_pages {
            let page_no = *next_page;
            *next_page += 1;
            let pid = PageId::new(self.file.id(), page_no);
            let handle = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            *buffered = handle.read().iter().cloned().collect();
        }
        Ok(!buffered.is_empty())
    }

    pub fn next(&mut self) -> StorageResult<Tuple> {
        if matches!(self.state, ScanState::Closed) {
            return Err(StorageError::ScanClosed);
        }
        if !self.has_next()? {
            return Err(StorageError::ScanExhausted);
        }
        match &mut self.state {
            ScanState::Open { buffered, .. } => {
                buffered.pop_front().ok_or(StorageError::ScanExhausted)
            }
            ScanState::Closed => Err(StorageError::ScanClosed),
        }
    }

    /// Restarts an open cursor from page 0.
    pub fn rewind(&mut self) -> StorageResult<()> {
        if matches!(self.state, ScanState::Closed) {
            return Err(StorageError::ScanClosed);
        }
        self.open()
    }

    pub fn close(&mut self) {
        self.state = ScanState::Closed;
    }
}

impl Iterator for HeapScan {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(HeapScan::next(self)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

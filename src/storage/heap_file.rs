//! Heap file: an unordered collection of fixed-size pages backing one table.
//!
//! The file maps logical page numbers to byte offsets (`page_no * page_size`)
//! and only ever grows by appending one page at the end. All page fetches by
//! the insert/delete/scan paths go through the buffer pool; raw
//! `read_page`/`write_page` are the pool's disk hooks.

use crate::access::scan::HeapScan;
use crate::access::tuple::{Tuple, TupleDesc};
use crate::catalog::TableId;
use crate::storage::buffer::{BufferPool, PageHandle, Permissions};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, PageId};
use crate::storage::DEFAULT_PAGE_SIZE;
use crate::transaction::TransactionId;
use log::debug;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub struct HeapFile {
    path: PathBuf,
    desc: TupleDesc,
    page_size: usize,
    id: TableId,
}

impl HeapFile {
    /// Creates a heap file over `path` with the default page size. The file
    /// itself is created lazily on first write.
    pub fn new(path: impl Into<PathBuf>, desc: TupleDesc) -> StorageResult<Self> {
        Self::with_page_size(path, desc, DEFAULT_PAGE_SIZE)
    }

    /// Page-size override for tests that want small pages.
    pub fn with_page_size(
        path: impl Into<PathBuf>,
        desc: TupleDesc,
        page_size: usize,
    ) -> StorageResult<Self> {
        let path = std::path::absolute(path.into())?;

        // The table id is derived once from the backing path and stable for
        // the file's lifetime.
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let id = hasher.finish() as TableId;

        Ok(Self {
            path,
            desc,
            page_size,
            id,
        })
    }

    /// Stable identifier of this file, used as the table id in page ids.
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently in the file, rounding a short final page up.
    pub fn num_pages(&self) -> StorageResult<u32> {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(len.div_ceil(self.page_size as u64) as u32)
    }

    /// Reads and decodes one page straight from disk, bypassing the cache.
    pub fn read_page(&self, pid: PageId) -> StorageResult<HeapPage> {
        if pid.table != self.id {
            return Err(StorageError::WrongTable {
                pid,
                table: self.id,
            });
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(pid.page_no as u64 * self.page_size as u64))?;

        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf)?;
        HeapPage::parse(pid, &buf, &self.desc)
    }

    /// Encodes and writes one page at its offset, extending the file if the
    /// offset is at or past the current end.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;

        let offset = page.id().page_no as u64 * self.page_size as u64;
        if offset >= file.metadata()?.len() {
            file.set_len(offset + self.page_size as u64)?;
        }

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.encode()?)?;
        file.sync_all()?;
        Ok(())
    }

    /// First-fit insert: walks pages in ascending order through the buffer
    /// pool under write permission and uses the first one with a free slot,
    /// appending a fresh page when every existing page is full. Exactly one
    /// page is mutated.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> StorageResult<Vec<PageHandle>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.id, page_no);
            let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            let mut page = handle.write();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tuple)?;
                drop(page);
                return Ok(vec![handle]);
            }
        }

        // Every existing page is full: append one empty page at the end.
        let pid = PageId::new(self.id, self.num_pages()?);
        let data = HeapPage::empty_page_data(self.page_size);
        let mut page = HeapPage::parse(pid, &data, &self.desc)?;
        page.insert_tuple(tuple)?;
        self.write_page(&page)?;
        debug!("appended page {} to heap file {:#x}", pid, self.id);
        Ok(vec![Arc::new(RwLock::new(page))])
    }

    /// Deletes `tuple` from the page its record id names and persists that
    /// page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageHandle>> {
        let rid = tuple.record_id().ok_or(StorageError::TupleNotFound)?;
        if rid.page_id.table != self.id {
            return Err(StorageError::TupleNotFound);
        }

        let handle = pool
            .get_page(tid, rid.page_id, Permissions::ReadWrite)
            .map_err(|e| match e {
                StorageError::TransactionAborted(_) => e,
                _ => StorageError::TupleNotFound,
            })?;
        {
            let mut page = handle.write();
            page.delete_tuple(tuple)?;
            self.write_page(&page)?;
        }
        Ok(vec![handle])
    }

    /// A restartable sequential cursor over this file's tuples, fetching
    /// every page through the buffer pool under read permission.
    pub fn scan(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapScan {
        HeapScan::new(Arc::clone(self), pool, tid)
    }
}

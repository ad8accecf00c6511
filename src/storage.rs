//! Storage layer implementation for heapdb.
//!
//! This module provides the foundation for persistent data storage using a
//! page-based architecture. Key components:
//!
//! - **HeapPage**: fixed-size pages holding a slot bitmap and fixed-width
//!   tuple slots, the basic unit of I/O
//! - **HeapFile**: maps logical page numbers to byte offsets in one backing
//!   file and implements first-fit insertion
//! - **BufferPool**: bounded in-memory page cache with LRU eviction and the
//!   per-transaction page lock table
//!
//! The buffer pool is the sole path by which any other component touches a
//! page; write-ahead logging and recovery are external collaborators that
//! plug into the hooks it exposes (`discard_page`, page before-images,
//! commit-aware transaction completion).

pub mod buffer;
pub mod error;
pub mod heap_file;
pub mod page;

/// Bytes per page, including the header. Tests override per file/pool.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages a buffer pool caches.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

pub use buffer::{BufferPool, LockMode, PageHandle, Permissions};
pub use error::{StorageError, StorageResult};
pub use heap_file::HeapFile;
pub use page::{HeapPage, PageId};

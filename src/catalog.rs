//! Registry mapping table ids to their heap files and schemas.
//!
//! The storage core only needs the two lookups the buffer pool performs:
//! table id to heap file (for disk reads and flushes) and table id to tuple
//! descriptor. Everything else a full catalog would do lives outside this
//! crate.

use crate::access::tuple::TupleDesc;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::heap_file::HeapFile;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifier of one table, derived from its heap file's backing path.
pub type TableId = u32;

#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<HeapFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a heap file under its own id, replacing any previous file
    /// with the same id.
    pub fn register_table(&self, file: Arc<HeapFile>) {
        self.tables.write().insert(file.id(), file);
    }

    /// The heap file backing `table`.
    pub fn table(&self, table: TableId) -> StorageResult<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table)
            .cloned()
            .ok_or(StorageError::UnknownTable(table))
    }

    /// The tuple descriptor of `table`'s rows.
    pub fn tuple_desc(&self, table: TableId) -> StorageResult<TupleDesc> {
        Ok(self.table(table)?.tuple_desc().clone())
    }
}

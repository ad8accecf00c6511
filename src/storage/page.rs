pub mod heap_page;

use crate::catalog::TableId;

/// Identifier of one fixed-size page: the owning table plus the page's index
/// within that table's backing file. Used as the cache and lock-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table: TableId, page_no: u32) -> Self {
        Self { table, page_no }
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}:{}", self.table, self.page_no)
    }
}

pub use heap_page::HeapPage;

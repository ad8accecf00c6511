//! Tuples, record identifiers, and tuple descriptors.

use crate::access::value::{DataType, Value};
use crate::storage::error::StorageResult;
use crate::storage::page::PageId;
use std::cmp::Ordering;
use std::io::Read;

/// Storage address of one tuple: a page plus a slot index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: u16) -> Self {
        Self { page_id, slot }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.page_id.table, self.page_id.page_no, self.slot).cmp(&(
            other.page_id.table,
            other.page_id.page_no,
            other.slot,
        ))
    }
}

/// Ordered list of field types describing one table's rows.
///
/// All fields are fixed width, so the serialized size of every tuple in a
/// table is the same and known up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    types: Vec<DataType>,
}

impl TupleDesc {
    pub fn new(types: Vec<DataType>) -> Self {
        Self { types }
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    /// Serialized size in bytes of one tuple with this descriptor.
    pub fn tuple_size(&self) -> usize {
        self.types.iter().map(|t| t.size()).sum()
    }
}

/// One row of a table, optionally pinned to a storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    record_id: Option<RecordId>,
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            record_id: None,
            values,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Checks that this tuple's field types match `desc` exactly.
    pub fn matches(&self, desc: &TupleDesc) -> bool {
        self.values.len() == desc.num_fields()
            && self
                .values
                .iter()
                .zip(desc.types())
                .all(|(v, t)| v.data_type() == *t)
    }

    /// Serializes all fields in order. The result is exactly
    /// `desc.tuple_size()` bytes for a tuple matching its descriptor.
    pub fn serialize(&self) -> StorageResult<Vec<u8>> {
        let mut out = Vec::new();
        for value in &self.values {
            value.serialize(&mut out)?;
        }
        Ok(out)
    }

    /// Reads one tuple of shape `desc` from `reader`.
    pub fn deserialize<R: Read>(reader: &mut R, desc: &TupleDesc) -> StorageResult<Self> {
        let mut values = Vec::with_capacity(desc.num_fields());
        for data_type in desc.types() {
            values.push(Value::deserialize(reader, *data_type)?);
        }
        Ok(Tuple::new(values))
    }
}

impl std::fmt::Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", fields.join(", "))
    }
}

/// Convenience constructor used widely in tests.
pub fn int_tuple(values: &[i32]) -> Tuple {
    Tuple::new(values.iter().map(|&v| Value::Int(v)).collect())
}

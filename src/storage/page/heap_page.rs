//! Fixed-slot heap page codec.
//!
//! On disk a heap page is a slot-usage bitmap followed by fixed-width tuple
//! slots followed by zero padding:
//!
//! ```text
//! [ header: ceil(num_slots / 8) bytes, bit i = 1 iff slot i occupied ]
//! [ slot 0 .. slot num_slots-1, each tuple_size bytes                ]
//! [ zero padding up to the page size                                 ]
//! ```
//!
//! with `num_slots = floor(page_size * 8 / (tuple_size * 8 + 1))`. Occupied
//! slots hold serialized field bytes; free slots serialize as zeros. The codec
//! performs no I/O of its own.

use crate::access::tuple::{RecordId, Tuple, TupleDesc};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use std::io::Cursor;

const BITS_PER_BYTE: usize = 8;

/// In-memory image of one heap page, parsed against a table's descriptor.
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    page_size: usize,
    num_slots: usize,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    /// Raw bytes as of construction, for the recovery collaborator. Never
    /// updated afterwards.
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Number of tuple slots on a page of `page_size` bytes holding tuples of
    /// `tuple_size` bytes. Each slot costs `tuple_size` bytes plus one header
    /// bit.
    pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
        (page_size * BITS_PER_BYTE) / (tuple_size * BITS_PER_BYTE + 1)
    }

    /// Header size in bytes for a page with `num_slots` slots.
    pub fn header_size(num_slots: usize) -> usize {
        num_slots.div_ceil(BITS_PER_BYTE)
    }

    /// An all-zero page image. Parses to a page with zero occupied slots.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    /// Decodes `data` into a page. `data` must be exactly one page long; the
    /// slot count is derived from its length and the descriptor's tuple size.
    pub fn parse(pid: PageId, data: &[u8], desc: &TupleDesc) -> StorageResult<Self> {
        let page_size = data.len();
        let tuple_size = desc.tuple_size();
        let num_slots = Self::slots_per_page(page_size, tuple_size);
        let header_size = Self::header_size(num_slots);

        let header = data[..header_size].to_vec();
        let mut tuples = Vec::with_capacity(num_slots);

        for slot in 0..num_slots {
            let start = header_size + slot * tuple_size;
            let slot_bytes = &data[start..start + tuple_size];
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                // Free slot: bytes are skipped, their value is discarded.
                tuples.push(None);
            } else {
                let mut tuple = Tuple::deserialize(&mut Cursor::new(slot_bytes), desc)?;
                tuple.set_record_id(Some(RecordId::new(pid, slot as u16)));
                tuples.push(Some(tuple));
            }
        }

        Ok(Self {
            pid,
            desc: desc.clone(),
            page_size,
            num_slots,
            header,
            tuples,
            before_image: data.to_vec(),
        })
    }

    /// Encodes this page back into its on-disk byte layout. Free slots emit
    /// zero bytes even if they held data before a delete.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let tuple_size = self.desc.tuple_size();
        let mut out = Vec::with_capacity(self.page_size);
        out.extend_from_slice(&self.header);

        for stored in &self.tuples {
            match stored {
                Some(tuple) => {
                    let bytes = tuple.serialize()?;
                    if bytes.len() != tuple_size {
                        return Err(StorageError::Format(format!(
                            "tuple serialized to {} bytes, expected {}",
                            bytes.len(),
                            tuple_size
                        )));
                    }
                    out.extend_from_slice(&bytes);
                }
                None => out.resize(out.len() + tuple_size, 0),
            }
        }

        out.resize(self.page_size, 0);
        Ok(out)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&s| !self.is_slot_used(s)).count()
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Stores `tuple` in the lowest free slot and returns its new record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> StorageResult<RecordId> {
        if !tuple.matches(&self.desc) {
            return Err(StorageError::Format(
                "tuple does not match the table descriptor".to_string(),
            ));
        }

        let slot = (0..self.num_slots)
            .find(|&s| !self.is_slot_used(s))
            .ok_or(StorageError::PageFull(self.pid))?;

        let rid = RecordId::new(self.pid, slot as u16);
        tuple.set_record_id(Some(rid));
        self.set_slot_used(slot, true);
        self.tuples[slot] = Some(tuple);
        Ok(rid)
    }

    /// Clears the slot named by `tuple`'s record id. The slot's bytes remain
    /// in memory until the next encode, which zeroes them.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> StorageResult<()> {
        let rid = tuple.record_id().ok_or(StorageError::TupleNotFound)?;
        if rid.page_id != self.pid {
            return Err(StorageError::TupleNotFound);
        }

        let slot = rid.slot as usize;
        if slot >= self.num_slots || !self.is_slot_used(slot) {
            return Err(StorageError::TupleNotFound);
        }
        match &self.tuples[slot] {
            Some(stored) if stored.values() == tuple.values() => {}
            _ => return Err(StorageError::TupleNotFound),
        }

        self.set_slot_used(slot, false);
        self.tuples[slot] = None;
        Ok(())
    }

    /// Occupied tuples in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples.iter().flatten()
    }

    /// Raw page bytes as of construction time.
    pub fn before_image_data(&self) -> &[u8] {
        &self.before_image
    }

    /// The page as it looked when this object was constructed. Used by a
    /// recovery collaborator to roll back in-memory mutations.
    pub fn before_image(&self) -> StorageResult<HeapPage> {
        HeapPage::parse(self.pid, &self.before_image, &self.desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tuple::int_tuple;
    use crate::access::value::DataType;
    use crate::catalog::TableId;

    const TEST_TABLE: TableId = 0xbeef;

    fn pid(page_no: u32) -> PageId {
        PageId::new(TEST_TABLE, page_no)
    }

    fn int_desc(fields: usize) -> TupleDesc {
        TupleDesc::new(vec![DataType::Int; fields])
    }

    /// 64-byte page of single-int tuples: floor(512 / 33) = 15 slots,
    /// header = 2 bytes.
    fn small_page() -> HeapPage {
        let data = HeapPage::empty_page_data(64);
        HeapPage::parse(pid(0), &data, &int_desc(1)).unwrap()
    }

    #[test]
    fn test_slot_count_law() {
        // 20-byte tuples on a 4096-byte page.
        assert_eq!(HeapPage::slots_per_page(4096, 20), 25);
        assert_eq!(HeapPage::header_size(25), 4);

        // 4-byte tuples on a 4096-byte page.
        assert_eq!(HeapPage::slots_per_page(4096, 4), 992);
        assert_eq!(HeapPage::header_size(992), 124);
    }

    #[test]
    fn test_empty_page_has_no_tuples() {
        let page = small_page();
        assert_eq!(page.num_slots(), 15);
        assert_eq!(page.num_empty_slots(), 15);
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn test_insert_assigns_lowest_free_slot() -> StorageResult<()> {
        let mut page = small_page();

        let rid0 = page.insert_tuple(int_tuple(&[10]))?;
        let rid1 = page.insert_tuple(int_tuple(&[11]))?;
        assert_eq!(rid0.slot, 0);
        assert_eq!(rid1.slot, 1);
        assert_eq!(rid0.page_id, pid(0));

        // Freeing slot 0 makes it the next insertion target again.
        let mut victim = int_tuple(&[10]);
        victim.set_record_id(Some(rid0));
        page.delete_tuple(&victim)?;

        let rid2 = page.insert_tuple(int_tuple(&[12]))?;
        assert_eq!(rid2.slot, 0);
        Ok(())
    }

    #[test]
    fn test_insert_delete_inverse() -> StorageResult<()> {
        let mut page = small_page();
        page.insert_tuple(int_tuple(&[1]))?;
        let before = page.num_empty_slots();

        let rid = page.insert_tuple(int_tuple(&[2]))?;
        assert_eq!(page.num_empty_slots(), before - 1);

        let mut t = int_tuple(&[2]);
        t.set_record_id(Some(rid));
        page.delete_tuple(&t)?;
        assert_eq!(page.num_empty_slots(), before);
        Ok(())
    }

    #[test]
    fn test_page_full() -> StorageResult<()> {
        let mut page = small_page();
        for i in 0..page.num_slots() as i32 {
            page.insert_tuple(int_tuple(&[i]))?;
        }
        assert_eq!(page.num_empty_slots(), 0);
        assert!(matches!(
            page.insert_tuple(int_tuple(&[99])),
            Err(StorageError::PageFull(_))
        ));
        Ok(())
    }

    #[test]
    fn test_delete_rejects_foreign_and_absent_tuples() -> StorageResult<()> {
        let mut page = small_page();
        let rid = page.insert_tuple(int_tuple(&[5]))?;

        // No record id at all.
        assert!(matches!(
            page.delete_tuple(&int_tuple(&[5])),
            Err(StorageError::TupleNotFound)
        ));

        // Record id naming another page.
        let mut foreign = int_tuple(&[5]);
        foreign.set_record_id(Some(RecordId::new(pid(7), 0)));
        assert!(matches!(
            page.delete_tuple(&foreign),
            Err(StorageError::TupleNotFound)
        ));

        // Right slot, wrong content.
        let mut wrong = int_tuple(&[6]);
        wrong.set_record_id(Some(rid));
        assert!(matches!(
            page.delete_tuple(&wrong),
            Err(StorageError::TupleNotFound)
        ));

        // Deleting twice fails the second time.
        let mut t = int_tuple(&[5]);
        t.set_record_id(Some(rid));
        page.delete_tuple(&t)?;
        assert!(matches!(
            page.delete_tuple(&t),
            Err(StorageError::TupleNotFound)
        ));
        Ok(())
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut page = small_page();
        assert!(matches!(
            page.insert_tuple(int_tuple(&[1, 2])),
            Err(StorageError::Format(_))
        ));
    }

    #[test]
    fn test_round_trip_preserves_occupancy_and_values() -> StorageResult<()> {
        let mut page = small_page();
        let values = [3, 1, 4, 1, 5, 9, 2, 6];
        for v in values {
            page.insert_tuple(int_tuple(&[v]))?;
        }
        // Punch a hole so occupancy is not contiguous.
        let mut hole = int_tuple(&[4]);
        hole.set_record_id(Some(RecordId::new(pid(0), 2)));
        page.delete_tuple(&hole)?;

        let bytes = page.encode()?;
        assert_eq!(bytes.len(), 64);

        let reparsed = HeapPage::parse(pid(0), &bytes, &int_desc(1))?;
        assert_eq!(reparsed.num_empty_slots(), page.num_empty_slots());
        for slot in 0..page.num_slots() {
            assert_eq!(reparsed.is_slot_used(slot), page.is_slot_used(slot));
        }
        let original: Vec<_> = page.iter().map(|t| t.values().to_vec()).collect();
        let round_tripped: Vec<_> = reparsed.iter().map(|t| t.values().to_vec()).collect();
        assert_eq!(original, round_tripped);
        Ok(())
    }

    #[test]
    fn test_reencode_is_byte_identical() -> StorageResult<()> {
        let mut page = small_page();
        for v in [7, 8, 9] {
            page.insert_tuple(int_tuple(&[v]))?;
        }
        let bytes = page.encode()?;
        let reparsed = HeapPage::parse(pid(0), &bytes, &int_desc(1))?;
        assert_eq!(reparsed.encode()?, bytes);
        Ok(())
    }

    #[test]
    fn test_deleted_slot_encodes_as_zeros() -> StorageResult<()> {
        let mut page = small_page();
        let rid = page.insert_tuple(int_tuple(&[0x0102_0304]))?;
        let mut t = int_tuple(&[0x0102_0304]);
        t.set_record_id(Some(rid));
        page.delete_tuple(&t)?;

        let bytes = page.encode()?;
        let header_size = HeapPage::header_size(page.num_slots());
        assert!(bytes[header_size..header_size + 4].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn test_iteration_order_skips_free_slots() -> StorageResult<()> {
        let mut page = small_page();
        for v in 0..6 {
            page.insert_tuple(int_tuple(&[v]))?;
        }
        for victim in [1, 3] {
            let mut t = int_tuple(&[victim]);
            t.set_record_id(Some(RecordId::new(pid(0), victim as u16)));
            page.delete_tuple(&t)?;
        }

        let slots: Vec<u16> = page
            .iter()
            .map(|t| t.record_id().unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 2, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_before_image_is_a_construction_snapshot() -> StorageResult<()> {
        let data = HeapPage::empty_page_data(64);
        let mut page = HeapPage::parse(pid(0), &data, &int_desc(1))?;

        page.insert_tuple(int_tuple(&[42]))?;
        assert_eq!(page.before_image_data(), &data[..]);

        let snapshot = page.before_image()?;
        assert_eq!(snapshot.num_empty_slots(), snapshot.num_slots());
        Ok(())
    }

    #[test]
    fn test_parse_rejects_truncated_fields() {
        // A text descriptor whose slots would straddle a page this small
        // cannot exist, so corrupt the header of a valid int page instead:
        // mark a slot occupied whose bytes cannot be parsed as a full tuple.
        let desc = TupleDesc::new(vec![DataType::Text]);
        let page_size = 140;
        let num_slots = HeapPage::slots_per_page(page_size, desc.tuple_size());
        assert_eq!(num_slots, 1);

        let mut data = HeapPage::empty_page_data(page_size);
        data[0] = 0b0000_0001; // slot 0 occupied
        // Length prefix claims more text than a field can hold.
        data[1..5].copy_from_slice(&(1000u32).to_be_bytes());
        assert!(matches!(
            HeapPage::parse(pid(0), &data, &desc),
            Err(StorageError::Format(_))
        ));
    }
}

use std::sync::Arc;

use bytes::Bytes;

use crate::common::{page_size, PageId, RecordId, Result, SlotId, StorageError, TransactionId};
use crate::tuple::{Schema, Tuple};

/// Heap page layout:
///
/// +------------------+
/// | Header bitmap    |  ceil(num_slots / 8) bytes, bit i = slot i occupied
/// +------------------+
/// | [slot 0]         |  tuple_size bytes each
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// | zero padding     |  up to page_size
/// +------------------+
///
/// Bits are numbered least-significant first within each header byte.
/// `num_slots = floor(page_size * 8 / (tuple_size_bits + 1))`: every slot
/// costs its tuple width plus one header bit.
///
/// Besides its contents a resident page carries two pieces of volatile
/// state that are never written to disk: the transaction that dirtied it and
/// the before-image, i.e. the bytes as of the last commit.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Bytes,
}

impl HeapPage {
    /// Returns the number of tuple slots a page holds for `schema` at the
    /// current page size.
    pub fn slots_per_page(schema: &Schema) -> usize {
        (page_size() * 8) / (schema.tuple_size_bits() + 1)
    }

    /// Returns the header size in bytes for `schema` at the current page size.
    pub fn header_size_for(schema: &Schema) -> usize {
        Self::slots_per_page(schema).div_ceil(8)
    }

    /// Returns the on-disk image of a page with every slot free.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    /// Reconstructs a page from its on-disk image.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let page_size = page_size();
        if data.len() < page_size {
            return Err(StorageError::PageNotFound(page_id));
        }
        let data = &data[..page_size];

        let num_slots = Self::slots_per_page(&schema);
        let header_size = num_slots.div_ceil(8);
        let tuple_size = schema.tuple_size();
        let header = data[..header_size].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            if header[i / 8] & (1 << (i % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let start = header_size + i * tuple_size;
            let tuple = Tuple::from_bytes(schema.clone(), &data[start..start + tuple_size])
                .ok_or_else(|| {
                    StorageError::SchemaMismatch(format!("slot {} of {} is unreadable", i, page_id))
                })?;
            let record_id = RecordId::new(page_id, SlotId::new(i as u32));
            slots.push(Some(tuple.with_record_id(record_id)));
        }

        Ok(Self {
            page_id,
            schema,
            page_size,
            header,
            slots,
            dirtier: None,
            before_image: Bytes::copy_from_slice(data),
        })
    }

    /// Serializes the page to exactly `page_size` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tuple_size = self.schema.tuple_size();
        let mut data = Vec::with_capacity(self.page_size);
        data.extend_from_slice(&self.header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => data.extend(tuple.to_bytes()),
                None => data.resize(data.len() + tuple_size, 0),
            }
        }
        data.resize(self.page_size, 0);
        data
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn header_size(&self) -> usize {
        self.header.len()
    }

    /// Returns the number of unoccupied slots.
    pub fn free_slot_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Stores `tuple` in the first free slot and returns its record ID.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<RecordId> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(StorageError::SchemaMismatch(format!(
                "tuple ({}) does not match page ({})",
                tuple.schema(),
                self.schema
            )));
        }
        let slot = (0..self.slots.len())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(StorageError::PageFull(self.page_id))?;

        let record_id = RecordId::new(self.page_id, SlotId::new(slot as u32));
        self.mark_slot_used(slot, true);
        self.slots[slot] = Some(tuple.clone().with_record_id(record_id));
        Ok(record_id)
    }

    /// Tombstones the slot `tuple` was read from.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(StorageError::MissingRecordId)?;
        if record_id.page_id != self.page_id {
            return Err(StorageError::TupleNotOnPage {
                record_id,
                page_id: self.page_id,
            });
        }
        let slot = record_id.slot_id.as_usize();
        if slot >= self.slots.len() {
            return Err(StorageError::InvalidSlotId {
                slot: record_id.slot_id.as_u32(),
                num_slots: self.slots.len(),
            });
        }
        if !self.is_slot_used(slot) {
            return Err(StorageError::NoSuchTuple(record_id));
        }
        self.mark_slot_used(slot, false);
        self.slots[slot] = None;
        Ok(())
    }

    /// Returns the tuple in `slot`, if occupied.
    pub fn tuple(&self, slot: SlotId) -> Option<&Tuple> {
        self.slots.get(slot.as_usize()).and_then(|s| s.as_ref())
    }

    /// Iterates occupied slots in ascending slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Sets or clears the dirtying transaction.
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    /// Returns the transaction that dirtied this page, or `None` if clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Returns the page bytes as of the last commit.
    pub fn before_image(&self) -> &Bytes {
        &self.before_image
    }

    /// Makes the current contents the new committed baseline.
    pub fn set_before_image(&mut self) {
        self.before_image = Bytes::from(self.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::tuple::{DataType, TupleBuilder};

    fn schema() -> Arc<Schema> {
        Schema::builder()
            .column("a", DataType::Integer)
            .column("b", DataType::Integer)
            .build_arc()
    }

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(1), n)
    }

    fn tuple(schema: &Arc<Schema>, a: i32) -> Tuple {
        TupleBuilder::new(schema.clone())
            .value(a)
            .value(a * 10)
            .build()
            .unwrap()
    }

    fn empty_page() -> HeapPage {
        HeapPage::from_bytes(pid(0), schema(), &HeapPage::empty_page_data()).unwrap()
    }

    #[test]
    fn test_slot_geometry() {
        // Two ints = 64 bits per tuple, plus a header bit each.
        let page = empty_page();
        assert_eq!(page.num_slots(), 4096 * 8 / 65);
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.header_size(), 63);
        assert_eq!(page.free_slot_count(), 504);
        assert_eq!(page.tuples().count(), 0);
    }

    #[test]
    fn test_insert_uses_first_free_slot() {
        let schema = schema();
        let mut page = empty_page();

        let r0 = page.insert_tuple(&tuple(&schema, 1)).unwrap();
        let r1 = page.insert_tuple(&tuple(&schema, 2)).unwrap();
        assert_eq!(r0.slot_id, SlotId::new(0));
        assert_eq!(r1.slot_id, SlotId::new(1));

        let first = page.tuple(SlotId::new(0)).unwrap().clone();
        page.delete_tuple(&first).unwrap();
        assert!(!page.is_slot_used(0));

        let r2 = page.insert_tuple(&tuple(&schema, 3)).unwrap();
        assert_eq!(r2.slot_id, SlotId::new(0));
        assert_eq!(page.free_slot_count(), page.num_slots() - 2);
    }

    #[test]
    fn test_bytes_roundtrip_preserves_header_and_record_ids() {
        let schema = schema();
        let mut page = empty_page();
        for i in 0..10 {
            page.insert_tuple(&tuple(&schema, i)).unwrap();
        }
        let victim = page.tuple(SlotId::new(3)).unwrap().clone();
        page.delete_tuple(&victim).unwrap();

        let bytes = page.to_bytes();
        assert_eq!(bytes.len(), 4096);
        assert_eq!(bytes[0], 0b1111_0111);
        assert_eq!(bytes[1], 0b0000_0011);

        let reread = HeapPage::from_bytes(pid(0), schema.clone(), &bytes).unwrap();
        let values: Vec<i64> = reread
            .tuples()
            .map(|t| t.value(0).unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 4, 5, 6, 7, 8, 9]);
        let rid = reread.tuples().nth(3).unwrap().record_id().unwrap();
        assert_eq!(rid, RecordId::new(pid(0), SlotId::new(4)));
    }

    #[test]
    fn test_page_full() {
        let schema = schema();
        let mut page = empty_page();
        for i in 0..page.num_slots() {
            page.insert_tuple(&tuple(&schema, i as i32)).unwrap();
        }
        assert_eq!(page.free_slot_count(), 0);
        let err = page.insert_tuple(&tuple(&schema, -1)).unwrap_err();
        assert!(matches!(err, StorageError::PageFull(_)));
    }

    #[test]
    fn test_delete_errors() {
        let schema = schema();
        let mut page = empty_page();

        let unplaced = tuple(&schema, 1);
        assert!(matches!(
            page.delete_tuple(&unplaced),
            Err(StorageError::MissingRecordId)
        ));

        let elsewhere = tuple(&schema, 1).with_record_id(RecordId::new(pid(9), SlotId::new(0)));
        assert!(matches!(
            page.delete_tuple(&elsewhere),
            Err(StorageError::TupleNotOnPage { .. })
        ));

        let out_of_range =
            tuple(&schema, 1).with_record_id(RecordId::new(pid(0), SlotId::new(9999)));
        assert!(matches!(
            page.delete_tuple(&out_of_range),
            Err(StorageError::InvalidSlotId { .. })
        ));

        let empty_slot = tuple(&schema, 1).with_record_id(RecordId::new(pid(0), SlotId::new(5)));
        assert!(matches!(
            page.delete_tuple(&empty_slot),
            Err(StorageError::NoSuchTuple(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_on_insert() {
        let other = Schema::builder().column("x", DataType::BigInt).build_arc();
        let t = TupleBuilder::new(other).value(5i64).build().unwrap();
        let mut page = empty_page();
        assert!(matches!(
            page.insert_tuple(&t),
            Err(StorageError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_dirty_and_before_image() {
        let schema = schema();
        let mut page = empty_page();
        let clean = page.to_bytes();
        assert_eq!(page.before_image().as_ref(), clean.as_slice());
        assert!(!page.is_dirty());

        let txn = TransactionId::next();
        page.insert_tuple(&tuple(&schema, 7)).unwrap();
        page.mark_dirty(Some(txn));
        assert_eq!(page.dirtier(), Some(txn));
        assert_eq!(page.before_image().as_ref(), clean.as_slice());

        page.set_before_image();
        assert_eq!(page.before_image().as_ref(), page.to_bytes().as_slice());

        page.mark_dirty(None);
        assert!(!page.is_dirty());
    }
}

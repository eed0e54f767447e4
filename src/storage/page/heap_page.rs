//! HeapPage - a fixed-size slotted page of fixed-width records.
//!
//! # Page Layout
//! ```text
//! ┌──────────────────────┬─────────┬─────────┬─────┬──────────────┬─────────┐
//! │ occupancy bitmap     │ slot 0  │ slot 1  │ ... │ slot N-1     │ padding │
//! │ ceil(N/8) bytes      │ w bytes │ w bytes │     │ w bytes      │         │
//! └──────────────────────┴─────────┴─────────┴─────┴──────────────┴─────────┘
//! N = floor(page_size × 8 / (w × 8 + 1)),  w = record width
//! ```
//! Bit `i % 8` of bitmap byte `i / 8` (least significant first) is set when
//! slot `i` holds a record.

use std::sync::Arc;

use crate::common::{Error, PageId, RecordId, Result, TransactionId};
use crate::storage::tuple::{Schema, Tuple};

/// Number of record slots that fit on a page.
///
/// Each record costs its width in bytes plus one bitmap bit.
#[inline]
pub fn slots_per_page(page_size: usize, record_width: usize) -> usize {
    (page_size * 8) / (record_width * 8 + 1)
}

/// Size of the occupancy bitmap for `num_slots` slots, in bytes.
#[inline]
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// A page of a heap file, as held in the buffer pool.
///
/// Besides the current bytes the page keeps a committed snapshot (the
/// before-image). The two are only reconciled at transaction boundaries:
/// the buffer pool calls [`set_before_image`](HeapPage::set_before_image)
/// at commit and swaps in [`before_image`](HeapPage::before_image) at
/// abort. Marking a page dirty never touches the snapshot.
///
/// `HeapPage` does not implement `Clone`; copying a page is done
/// explicitly through the before-image.
pub struct HeapPage {
    pid: PageId,
    schema: Arc<Schema>,
    num_slots: usize,
    /// Current bytes, exactly one page long.
    data: Box<[u8]>,
    /// Bytes as of the last load or commit.
    before_image: Box<[u8]>,
    /// Transaction that dirtied the page, `None` when clean.
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Wrap raw page bytes read from disk.
    ///
    /// The before-image starts out equal to `data`.
    ///
    /// # Errors
    /// `Error::SchemaMismatch` if not even one record of `schema` fits in
    /// a page of `data.len()` bytes.
    pub fn new(pid: PageId, data: Vec<u8>, schema: Arc<Schema>) -> Result<Self> {
        let num_slots = slots_per_page(data.len(), schema.record_width());
        if num_slots == 0 {
            return Err(Error::SchemaMismatch(format!(
                "record width {} does not fit in a {}-byte page",
                schema.record_width(),
                data.len()
            )));
        }

        let data = data.into_boxed_slice();
        Ok(Self {
            pid,
            schema,
            num_slots,
            before_image: data.clone(),
            data,
            dirtier: None,
        })
    }

    /// Create a page with every slot free.
    pub fn empty(pid: PageId, page_size: usize, schema: Arc<Schema>) -> Result<Self> {
        Self::new(pid, Self::empty_page_data(page_size), schema)
    }

    /// Bytes of a page with every slot free.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.pid
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Current bytes of the page, suitable for writing to disk.
    #[inline]
    pub fn page_data(&self) -> &[u8] {
        &self.data
    }

    // ========================================================================
    // Slot bitmap
    // ========================================================================

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots && self.data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.data[slot / 8] |= mask;
        } else {
            self.data[slot / 8] &= !mask;
        }
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots).filter(|&s| !self.is_slot_used(s)).count()
    }

    fn first_free_slot(&self) -> Option<usize> {
        (0..self.num_slots).find(|&s| !self.is_slot_used(s))
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let width = self.schema.record_width();
        let start = header_size(self.num_slots) + slot * width;
        start..start + width
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Store `tuple` in the first free slot and stamp its record id.
    ///
    /// # Errors
    /// - `Error::SchemaMismatch` if the tuple does not fit the schema
    /// - `Error::PageFull` if no slot is free
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId> {
        self.schema.check(tuple)?;
        let slot = self.first_free_slot().ok_or(Error::PageFull(self.pid))?;

        let range = self.slot_range(slot);
        let schema = Arc::clone(&self.schema);
        schema.encode(tuple, &mut self.data[range])?;
        self.set_slot_used(slot, true);

        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        Ok(rid)
    }

    /// Free the slot `tuple` was stored in.
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::InvalidSlot` if it lives on another page or its slot is empty
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if rid.pid != self.pid || !self.is_slot_used(rid.slot) {
            return Err(Error::InvalidSlot {
                pid: rid.pid,
                slot: rid.slot,
            });
        }
        self.set_slot_used(rid.slot, false);
        Ok(())
    }

    /// Decode the record in `slot`, or `None` if the slot is empty.
    pub fn tuple_at(&self, slot: usize) -> Result<Option<Tuple>> {
        if !self.is_slot_used(slot) {
            return Ok(None);
        }
        let mut tuple = self.schema.decode(&self.data[self.slot_range(slot)])?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(Some(tuple))
    }

    /// Decode every occupied slot in slot order; empty slots are skipped.
    pub fn tuples(&self) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(self.num_slots);
        for slot in 0..self.num_slots {
            if let Some(tuple) = self.tuple_at(slot)? {
                out.push(tuple);
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Dirty tracking and before-image
    // ========================================================================

    /// Set or clear the dirty flag. `tid` is recorded only when setting.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirtier = if dirty { Some(tid) } else { None };
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// The transaction that dirtied this page, if any.
    #[inline]
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// A clean page holding the bytes as of the last commit.
    pub fn before_image(&self) -> HeapPage {
        HeapPage {
            pid: self.pid,
            schema: Arc::clone(&self.schema),
            num_slots: self.num_slots,
            data: self.before_image.clone(),
            before_image: self.before_image.clone(),
            dirtier: None,
        }
    }

    /// Take the current bytes as the new committed snapshot.
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data);
    }
}

impl std::fmt::Debug for HeapPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapPage")
            .field("pid", &self.pid)
            .field("num_slots", &self.num_slots)
            .field("dirtier", &self.dirtier)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;
    use crate::storage::tuple::{Field, FieldType};
    use proptest::prelude::*;

    fn int_schema() -> Arc<Schema> {
        Arc::new(Schema::from_types(&[FieldType::Int, FieldType::Int]))
    }

    fn pid() -> PageId {
        PageId::new(TableId(1), 0)
    }

    fn tuple(a: i32, b: i32) -> Tuple {
        Tuple::new(vec![Field::Int(a), Field::Int(b)])
    }

    #[test]
    fn test_slot_arithmetic() {
        // 8-byte records: 4096 * 8 / 65 = 504 slots, 63 bitmap bytes.
        assert_eq!(slots_per_page(4096, 8), 504);
        assert_eq!(header_size(504), 63);
        assert!(header_size(504) + 504 * 8 <= 4096);

        assert_eq!(slots_per_page(64, 8), 7);
        assert_eq!(header_size(7), 1);
    }

    #[test]
    fn test_empty_page() {
        let page = HeapPage::empty(pid(), 4096, int_schema()).unwrap();
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.num_empty_slots(), 504);
        assert!(!page.is_dirty());
        assert!(page.tuples().unwrap().is_empty());
    }

    #[test]
    fn test_record_too_wide() {
        let schema = Arc::new(Schema::from_types(&[FieldType::Str]));
        let result = HeapPage::empty(pid(), 64, schema);
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_insert_sets_bit_and_record_id() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let mut t = tuple(1, 2);

        let rid = page.insert_tuple(&mut t).unwrap();

        assert_eq!(rid, RecordId::new(pid(), 0));
        assert_eq!(t.record_id(), Some(rid));
        assert!(page.is_slot_used(0));
        assert_eq!(page.page_data()[0], 0b0000_0001);
        assert_eq!(page.num_empty_slots(), 6);
    }

    #[test]
    fn test_insert_until_full() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        for i in 0..7 {
            page.insert_tuple(&mut tuple(i, i)).unwrap();
        }
        assert_eq!(page.num_empty_slots(), 0);

        let err = page.insert_tuple(&mut tuple(9, 9)).unwrap_err();
        assert!(matches!(err, Error::PageFull(_)));
    }

    #[test]
    fn test_delete_clears_bit_and_slot_is_reused() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let mut a = tuple(1, 1);
        let mut b = tuple(2, 2);
        page.insert_tuple(&mut a).unwrap();
        page.insert_tuple(&mut b).unwrap();

        page.delete_tuple(&a).unwrap();
        assert!(!page.is_slot_used(0));
        assert!(page.is_slot_used(1));

        let mut c = tuple(3, 3);
        let rid = page.insert_tuple(&mut c).unwrap();
        assert_eq!(rid.slot, 0);
    }

    #[test]
    fn test_delete_errors() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();

        assert!(matches!(
            page.delete_tuple(&tuple(1, 1)),
            Err(Error::MissingRecordId)
        ));

        let mut stale = tuple(1, 1);
        stale.set_record_id(Some(RecordId::new(pid(), 3)));
        assert!(matches!(
            page.delete_tuple(&stale),
            Err(Error::InvalidSlot { slot: 3, .. })
        ));

        let mut elsewhere = tuple(1, 1);
        elsewhere.set_record_id(Some(RecordId::new(PageId::new(TableId(1), 5), 0)));
        assert!(page.delete_tuple(&elsewhere).is_err());
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let mut t = Tuple::new(vec![Field::Int(1)]);
        assert!(matches!(
            page.insert_tuple(&mut t),
            Err(Error::SchemaMismatch(_))
        ));
        assert_eq!(page.num_empty_slots(), 7);
    }

    #[test]
    fn test_tuples_skip_empty_slots() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let mut stored = vec![];
        for i in 0..4 {
            let mut t = tuple(i, i * 10);
            page.insert_tuple(&mut t).unwrap();
            stored.push(t);
        }
        page.delete_tuple(&stored[1]).unwrap();

        let tuples = page.tuples().unwrap();
        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[0], stored[0]);
        assert_eq!(tuples[1], stored[2]);
        assert_eq!(tuples[2], stored[3]);
    }

    #[test]
    fn test_mark_dirty() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let tid = TransactionId::new();

        page.mark_dirty(true, tid);
        assert!(page.is_dirty());
        assert_eq!(page.dirtier(), Some(tid));

        page.mark_dirty(false, tid);
        assert!(!page.is_dirty());
        assert_eq!(page.dirtier(), None);
    }

    #[test]
    fn test_before_image_tracks_last_commit() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        let original = page.page_data().to_vec();
        let tid = TransactionId::new();

        page.insert_tuple(&mut tuple(1, 1)).unwrap();
        page.mark_dirty(true, tid);

        // Dirtying does not move the snapshot.
        let before = page.before_image();
        assert_eq!(before.page_data(), &original[..]);
        assert!(!before.is_dirty());

        // Commit point.
        page.set_before_image();
        let committed = page.page_data().to_vec();
        page.insert_tuple(&mut tuple(2, 2)).unwrap();

        assert_eq!(page.before_image().page_data(), &committed[..]);
    }

    #[test]
    fn test_reload_from_bytes() {
        let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
        page.insert_tuple(&mut tuple(5, 6)).unwrap();
        page.insert_tuple(&mut tuple(7, 8)).unwrap();

        let reloaded = HeapPage::new(pid(), page.page_data().to_vec(), int_schema()).unwrap();
        assert_eq!(reloaded.page_data(), page.page_data());
        assert_eq!(reloaded.tuples().unwrap(), page.tuples().unwrap());
    }

    proptest! {
        #[test]
        fn prop_occupancy_matches_live_tuples(
            values in proptest::collection::vec(any::<i32>(), 0..=7),
            delete_mask in any::<u8>(),
        ) {
            let mut page = HeapPage::empty(pid(), 64, int_schema()).unwrap();
            let mut stored = vec![];
            for v in &values {
                let mut t = tuple(*v, v.wrapping_neg());
                page.insert_tuple(&mut t).unwrap();
                stored.push(t);
            }

            let mut live = vec![];
            for (i, t) in stored.into_iter().enumerate() {
                if delete_mask & (1 << i) != 0 {
                    page.delete_tuple(&t).unwrap();
                } else {
                    live.push(t);
                }
            }

            prop_assert_eq!(page.num_empty_slots(), page.num_slots() - live.len());
            let reloaded = HeapPage::new(pid(), page.page_data().to_vec(), int_schema()).unwrap();
            prop_assert_eq!(reloaded.tuples().unwrap(), live);
        }
    }
}

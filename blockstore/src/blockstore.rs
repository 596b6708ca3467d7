//! The `blockstore` module provides read access to the ledger a validator
//! persists on disk: per-slot shredding metadata, raw shreds, and the blocks
//! that can be reassembled from them.

use {
    crate::{
        blockstore_db::{
            columns as cf, AccessType, BlockstoreError, Column, IteratorDirection, IteratorMode,
            LedgerColumn, Result, Rocks, TypedColumn,
        },
        blockstore_meta::SlotMeta,
        shred::{self, Shred},
    },
    bincode::deserialize,
    log::*,
    serde::Serialize,
    solana_clock::Slot,
    solana_entry::entry::Entry,
    solana_hash::Hash,
    solana_transaction::versioned::VersionedTransaction,
    std::{collections::BTreeSet, path::Path, sync::Arc},
};

pub use crate::blockstore_db::list_column_family_names;

pub type CompletedRanges = Vec<(u32, u32)>;

/// A slot's reassembled transactions.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Block {
    /// Hash of the slot's last entry.
    pub block_hash: Hash,
    /// The slot this block builds on; None for a detached head.
    pub parent_slot: Option<Slot>,
    pub transactions: Vec<VersionedTransaction>,
}

/// A read-only client for the blockstore database of a validator.
///
/// All operations are point-in-time reads: a handle opened read-only is
/// frozen at the snapshot taken at open, a secondary handle advances only at
/// explicit [`Blockstore::try_catch_up_with_primary`] calls. Individual
/// queries spanning several lookups (notably [`Blockstore::get_block`]) do
/// not pin one snapshot across the whole query.
pub struct Blockstore {
    db: Arc<Rocks>,
    meta_cf: LedgerColumn<cf::SlotMeta>,
    root_cf: LedgerColumn<cf::Root>,
    dead_slots_cf: LedgerColumn<cf::DeadSlots>,
    block_height_cf: LedgerColumn<cf::BlockHeight>,
    data_shred_cf: LedgerColumn<cf::ShredData>,
    code_shred_cf: LedgerColumn<cf::ShredCode>,
}

impl Blockstore {
    fn do_open(ledger_path: &Path, access_type: AccessType) -> Result<Blockstore> {
        let db = Arc::new(Rocks::open(ledger_path, access_type)?);
        Ok(Blockstore {
            meta_cf: db.column(),
            root_cf: db.column(),
            dead_slots_cf: db.column(),
            block_height_cf: db.column(),
            data_shred_cf: db.column(),
            code_shred_cf: db.column(),
            db,
        })
    }

    /// Attaches to a blockstore in read-only mode.
    ///
    /// Attaching to a running validator is supported, but the view of the
    /// database is frozen at the time of attaching.
    pub fn open_read_only(ledger_path: &Path) -> Result<Blockstore> {
        Self::do_open(ledger_path, AccessType::ReadOnly)
    }

    /// Attaches to a blockstore in secondary mode.
    ///
    /// Unlike [`Blockstore::open_read_only`] the view of the database can be
    /// refreshed with [`Blockstore::try_catch_up_with_primary`].
    /// `secondary_path` points to a directory where the secondary instance
    /// stores its info log.
    pub fn open_secondary(ledger_path: &Path, secondary_path: &Path) -> Result<Blockstore> {
        Self::do_open(
            ledger_path,
            AccessType::Secondary {
                secondary_path: secondary_path.to_path_buf(),
            },
        )
    }

    /// Updates the client's view of the database with the latest state of
    /// the primary. Only works for blockstores opened with
    /// [`Blockstore::open_secondary`].
    pub fn try_catch_up_with_primary(&self) -> Result<()> {
        self.db.try_catch_up_with_primary()
    }

    /// The last known root slot.
    pub fn max_root(&self) -> Result<Slot> {
        let mut iter = self.root_cf.raw_iterator()?;
        iter.seek_to_last();
        match iter.key() {
            Some(key) => Ok(cf::Root::index(key)),
            None => Err(BlockstoreError::NotFound),
        }
    }

    /// The block height recorded for the highest rooted slot.
    pub fn get_block_height(&self) -> Result<u64> {
        let mut iter = self.block_height_cf.raw_iterator()?;
        iter.seek_to_last();
        match iter.value() {
            // The stored value is a little-endian u64, unlike the keys of
            // this column which are big-endian.
            Some(value) => cf::BlockHeight::deserialize(value),
            None => Err(BlockstoreError::NotFound),
        }
    }

    /// The shredding metadata of a given slot.
    pub fn get_slot_meta(&self, slot: Slot) -> Result<SlotMeta> {
        self.meta_cf.get(slot)?.ok_or(BlockstoreError::NotFound)
    }

    /// Batched [`Blockstore::get_slot_meta`]; absent slots yield None.
    pub fn multi_get_slot_meta(&self, slots: &[Slot]) -> Result<Vec<Option<SlotMeta>>> {
        let keys = self.meta_cf.multi_get_keys(slots.iter().copied());
        self.meta_cf.multi_get(keys.iter()).collect()
    }

    /// Iterates `(slot, SlotMeta)` pairs in ascending slot order starting at
    /// `slot`.
    pub fn slot_meta_iterator(
        &self,
        slot: Slot,
    ) -> Result<impl Iterator<Item = (Slot, SlotMeta)> + '_> {
        let meta_iter = self
            .meta_cf
            .iter(IteratorMode::From(slot, IteratorDirection::Forward))?;
        Ok(meta_iter.map(|(slot, slot_meta_bytes)| {
            (
                slot,
                deserialize(&slot_meta_bytes).unwrap_or_else(|e| {
                    panic!("Could not deserialize SlotMeta for slot {slot}: {e:?}")
                }),
            )
        }))
    }

    /// Whether the validator gave up replaying this slot.
    pub fn is_dead(&self, slot: Slot) -> Result<bool> {
        Ok(matches!(
            self.dead_slots_cf.get_bytes(slot)?.as_deref(),
            Some([1])
        ))
    }

    /// Whether the slot was finalized by consensus. Roots are recorded by
    /// key existence alone.
    pub fn is_root(&self, slot: Slot) -> Result<bool> {
        Ok(self.root_cf.get_bytes(slot)?.is_some())
    }

    /// The stored bytes of a given data shred.
    pub fn get_data_shred(&self, slot: Slot, index: u64) -> Result<Option<Vec<u8>>> {
        self.data_shred_cf.get_bytes((slot, index))
    }

    /// The stored bytes of a given coding shred.
    pub fn get_coding_shred(&self, slot: Slot, index: u64) -> Result<Option<Vec<u8>>> {
        self.code_shred_cf.get_bytes((slot, index))
    }

    /// Iterates the stored data shreds of `slot` beginning at `index`.
    pub fn slot_data_iterator(
        &self,
        slot: Slot,
        index: u64,
    ) -> Result<impl Iterator<Item = ((u64, u64), Box<[u8]>)> + '_> {
        let slot_iterator = self.data_shred_cf.iter(IteratorMode::From(
            (slot, index),
            IteratorDirection::Forward,
        ))?;
        Ok(slot_iterator.take_while(move |((shred_slot, _), _)| *shred_slot == slot))
    }

    /// Iterates the stored coding shreds of `slot` beginning at `index`.
    pub fn slot_coding_iterator(
        &self,
        slot: Slot,
        index: u64,
    ) -> Result<impl Iterator<Item = ((u64, u64), Box<[u8]>)> + '_> {
        let slot_iterator = self.code_shred_cf.iter(IteratorMode::From(
            (slot, index),
            IteratorDirection::Forward,
        ))?;
        Ok(slot_iterator.take_while(move |((shred_slot, _), _)| *shred_slot == slot))
    }

    /// The parsed data shreds of `slot` beginning at `start_index`.
    pub fn get_data_shreds_for_slot(&self, slot: Slot, start_index: u64) -> Result<Vec<Shred>> {
        self.slot_data_iterator(slot, start_index)?
            .map(|(_, bytes)| Self::parse_stored_shred(bytes.into_vec()))
            .collect()
    }

    /// The parsed coding shreds of `slot` beginning at `start_index`.
    pub fn get_coding_shreds_for_slot(&self, slot: Slot, start_index: u64) -> Result<Vec<Shred>> {
        self.slot_coding_iterator(slot, start_index)?
            .map(|(_, bytes)| Self::parse_stored_shred(bytes.into_vec()))
            .collect()
    }

    fn parse_stored_shred(shred_bytes: Vec<u8>) -> Result<Shred> {
        Shred::new_from_serialized_shred(shred_bytes).map_err(|err| {
            BlockstoreError::InvalidShredData(Box::new(bincode::ErrorKind::Custom(format!(
                "Could not reconstruct shred from shred payload: {err:?}"
            ))))
        })
    }

    /// Reassembles the block at `slot` from its data shreds.
    ///
    /// Fails with [`BlockstoreError::NotFound`] unless the slot-meta reports
    /// the slot full and at least one entry deserializes out of its
    /// completed data ranges.
    pub fn get_block(&self, slot: Slot) -> Result<Block> {
        let meta = self.get_slot_meta(slot)?;
        if !meta.is_full() {
            return Err(BlockstoreError::NotFound);
        }
        let (entries, _num_shreds, _is_full) =
            self.get_slot_entries_with_shred_info(slot, 0, false)?;
        let Some(last_entry) = entries.last() else {
            return Err(BlockstoreError::NotFound);
        };
        let block_hash = last_entry.hash;
        let transactions = entries
            .into_iter()
            .flat_map(|entry| entry.transactions)
            .collect();
        Ok(Block {
            block_hash,
            parent_slot: meta.parent_slot,
            transactions,
        })
    }

    /// Returns the entry vector for the slot starting with `shred_start_index`
    pub fn get_slot_entries(&self, slot: Slot, shred_start_index: u64) -> Result<Vec<Entry>> {
        self.get_slot_entries_with_shred_info(slot, shred_start_index, false)
            .map(|x| x.0)
    }

    /// Returns the entry vector for the slot starting with `start_index`,
    /// the number of shreds that comprise the entry vector, and whether the
    /// slot is full (consumed all shreds).
    pub fn get_slot_entries_with_shred_info(
        &self,
        slot: Slot,
        start_index: u64,
        allow_dead_slots: bool,
    ) -> Result<(Vec<Entry>, u64, bool)> {
        let (completed_ranges, slot_meta) = self.get_completed_ranges(slot, start_index)?;

        // Dead-slot status is consulted only when the caller opts in via
        // allow_dead_slots. Full slots are never marked dead after the fact,
        // so the check may run after the completed ranges are fetched.
        if allow_dead_slots && self.is_dead(slot)? {
            return Err(BlockstoreError::DeadSlot);
        }

        let Some(slot_meta) = slot_meta else {
            return Ok((vec![], 0, false));
        };
        let num_shreds = completed_ranges
            .last()
            .map(|(_, end_index)| u64::from(*end_index) - start_index + 1)
            .unwrap_or(0);

        let mut entries = Vec::new();
        for (start_index, end_index) in completed_ranges {
            let mut range_entries = self.get_entries_in_data_block(slot, start_index, end_index)?;
            entries.append(&mut range_entries);
        }
        Ok((entries, num_shreds, slot_meta.is_full()))
    }

    fn get_completed_ranges(
        &self,
        slot: Slot,
        start_index: u64,
    ) -> Result<(CompletedRanges, Option<SlotMeta>)> {
        let Some(slot_meta) = self.meta_cf.get(slot)? else {
            return Ok((vec![], None));
        };
        // Find all the ranges for the completed data blocks
        let completed_ranges = Self::get_completed_data_ranges(
            start_index as u32,
            &slot_meta.completed_data_indexes,
            slot_meta.consumed as u32,
        );
        Ok((completed_ranges, Some(slot_meta)))
    }

    /// The range of indexes [start_index, end_index] of every completed data
    /// block. The completed-data indexes trimmed to `[start_index, consumed)`
    /// supply the end points; the i-th range begins at `start_index + i`,
    /// one index past the previous range's *beginning*.
    fn get_completed_data_ranges(
        start_index: u32,
        completed_data_indexes: &BTreeSet<u32>,
        consumed: u32,
    ) -> CompletedRanges {
        completed_data_indexes
            .range(start_index..consumed)
            .scan(start_index, |begin, index| {
                let out = (*begin, *index);
                *begin += 1;
                Some(out)
            })
            .collect()
    }

    /// Fetches the data shreds of one completed range and deserializes the
    /// entries they carry.
    pub fn get_entries_in_data_block(
        &self,
        slot: Slot,
        start_index: u32,
        end_index: u32,
    ) -> Result<Vec<Entry>> {
        let mut db_iterator = self.data_shred_cf.raw_iterator()?;
        db_iterator.seek(cf::ShredData::key(&(slot, u64::from(start_index))));

        let mut data_shreds = Vec::with_capacity((end_index - start_index + 1) as usize);
        for i in start_index..=end_index {
            let expected_index = u64::from(i);
            let index = db_iterator.key().map(|key| cf::ShredData::index(key).1);
            if index != Some(expected_index) {
                return Err(BlockstoreError::InvalidShredData(Box::new(
                    bincode::ErrorKind::Custom(format!(
                        "Missing shred for slot {slot}, index {expected_index}"
                    )),
                )));
            }
            let Some(shred_bytes) = db_iterator.value() else {
                return Err(BlockstoreError::InvalidShredData(Box::new(
                    bincode::ErrorKind::Custom(format!(
                        "Missing shred for slot {slot}, index {expected_index}"
                    )),
                )));
            };
            let shred = Shred::new_from_serialized_shred(shred_bytes.to_vec()).map_err(|err| {
                BlockstoreError::InvalidShredData(Box::new(bincode::ErrorKind::Custom(format!(
                    "Could not reconstruct shred from shred payload: {err:?}"
                ))))
            })?;
            data_shreds.push(shred);
            db_iterator.next();
        }

        let deshred_payload = shred::deshred(&data_shreds).map_err(|err| match err {
            shred::Error::TooFewDataShreds => BlockstoreError::TooFewDataShreds,
            err => BlockstoreError::InvalidShredData(Box::new(bincode::ErrorKind::Custom(
                format!("Could not reconstruct data block from constituent shreds, error: {err:?}"),
            ))),
        })?;

        debug!("{} data shreds in completed range", data_shreds.len());
        deserialize::<Vec<Entry>>(&deshred_payload).map_err(|err| {
            BlockstoreError::InvalidShredData(Box::new(bincode::ErrorKind::Custom(format!(
                "could not reconstruct entries: {err:?}"
            ))))
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::shred::{tests::new_serialized_data_shred, ShredFlags},
        assert_matches::assert_matches,
        solana_signature::Signature,
        tempfile::TempDir,
    };

    const TEST_COLUMNS: [&str; 7] = [
        "default",
        "meta",
        "root",
        "dead_slots",
        "block_height",
        "data_shred",
        "code_shred",
    ];

    /// A primary handle on a throwaway ledger directory; stands in for the
    /// validator that owns the database.
    struct LedgerWriter {
        db: rocksdb::DB,
    }

    impl LedgerWriter {
        fn create(path: &Path) -> Self {
            let mut options = rocksdb::Options::default();
            options.create_if_missing(true);
            options.create_missing_column_families(true);
            let db = rocksdb::DB::open_cf(&options, path, TEST_COLUMNS).unwrap();
            Self { db }
        }

        fn put(&self, cf: &str, key: &[u8], value: &[u8]) {
            let handle = self.db.cf_handle(cf).unwrap();
            self.db.put_cf(handle, key, value).unwrap();
        }

        fn put_slot_meta(&self, meta: &SlotMeta) {
            self.put(
                "meta",
                &meta.slot.to_be_bytes(),
                &bincode::serialize(meta).unwrap(),
            );
        }

        fn put_root(&self, slot: Slot) {
            self.put("root", &slot.to_be_bytes(), &bincode::serialize(&true).unwrap());
        }

        fn put_data_shred(&self, slot: Slot, index: u64, payload: &[u8]) {
            let mut key = [0u8; 16];
            key[..8].copy_from_slice(&slot.to_be_bytes());
            key[8..].copy_from_slice(&index.to_be_bytes());
            self.put("data_shred", &key, payload);
        }

        fn put_coding_shred(&self, slot: Slot, index: u64, payload: &[u8]) {
            let mut key = [0u8; 16];
            key[..8].copy_from_slice(&slot.to_be_bytes());
            key[8..].copy_from_slice(&index.to_be_bytes());
            self.put("code_shred", &key, payload);
        }
    }

    fn full_slot_meta(slot: Slot, num_shreds: u64) -> SlotMeta {
        SlotMeta {
            slot,
            consumed: num_shreds,
            received: num_shreds,
            last_index: Some(num_shreds - 1),
            parent_slot: Some(slot.saturating_sub(1)),
            completed_data_indexes: BTreeSet::from([num_shreds as u32 - 1]),
            ..SlotMeta::default()
        }
    }

    fn make_transaction(tag: u8) -> VersionedTransaction {
        VersionedTransaction {
            signatures: vec![Signature::from([tag; 64])],
            ..VersionedTransaction::default()
        }
    }

    /// Shreds `entries` into `num_shreds` data shreds for `slot` and writes
    /// them together with a matching slot meta.
    fn write_entries(writer: &LedgerWriter, slot: Slot, entries: &[Entry], num_shreds: u64) {
        let payload = bincode::serialize(&entries).unwrap();
        let chunk_len = payload.len() / num_shreds as usize;
        for index in 0..num_shreds {
            let start = index as usize * chunk_len;
            let end = if index == num_shreds - 1 {
                payload.len()
            } else {
                start + chunk_len
            };
            let flags = if index == num_shreds - 1 {
                ShredFlags::LAST_SHRED_IN_SLOT
            } else {
                ShredFlags::empty()
            };
            let shred =
                new_serialized_data_shred(0xA5, slot, index as u32, flags, &payload[start..end]);
            writer.put_data_shred(slot, index, &shred);
        }
        writer.put_slot_meta(&full_slot_meta(slot, num_shreds));
    }

    #[test]
    fn test_open_missing_column_family() {
        let ledger_path = TempDir::new().unwrap();
        {
            let mut options = rocksdb::Options::default();
            options.create_if_missing(true);
            options.create_missing_column_families(true);
            let _db =
                rocksdb::DB::open_cf(&options, ledger_path.path(), ["default", "meta"]).unwrap();
        }
        assert_matches!(
            Blockstore::open_read_only(ledger_path.path()),
            Err(BlockstoreError::UnexpectedColumnFamilySet(_))
        );
    }

    #[test]
    fn test_max_root() {
        let ledger_path = TempDir::new().unwrap();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put_root(7);
            writer.put_root(42);
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_eq!(blockstore.max_root().unwrap(), 42);
        assert!(blockstore.is_root(7).unwrap());
        assert!(!blockstore.is_root(8).unwrap());
    }

    #[test]
    fn test_max_root_empty() {
        let ledger_path = TempDir::new().unwrap();
        LedgerWriter::create(ledger_path.path());
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_matches!(blockstore.max_root(), Err(BlockstoreError::NotFound));
    }

    #[test]
    fn test_get_block_height() {
        let ledger_path = TempDir::new().unwrap();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put(
                "block_height",
                &1u64.to_be_bytes(),
                &[0x64, 0, 0, 0, 0, 0, 0, 0],
            );
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_eq!(blockstore.get_block_height().unwrap(), 100);
    }

    #[test]
    fn test_get_block_height_empty() {
        let ledger_path = TempDir::new().unwrap();
        LedgerWriter::create(ledger_path.path());
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_matches!(blockstore.get_block_height(), Err(BlockstoreError::NotFound));
    }

    #[test]
    fn test_slot_meta_queries() {
        let ledger_path = TempDir::new().unwrap();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            for slot in [10u64, 12, 13] {
                writer.put_slot_meta(&SlotMeta {
                    slot,
                    received: slot * 10,
                    ..SlotMeta::default()
                });
            }
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();

        assert_eq!(blockstore.get_slot_meta(12).unwrap().received, 120);
        assert_matches!(blockstore.get_slot_meta(11), Err(BlockstoreError::NotFound));

        let metas = blockstore.multi_get_slot_meta(&[10, 11, 13]).unwrap();
        assert_eq!(metas[0].as_ref().unwrap().received, 100);
        assert!(metas[1].is_none());
        assert_eq!(metas[2].as_ref().unwrap().received, 130);

        let slots: Vec<Slot> = blockstore
            .slot_meta_iterator(11)
            .unwrap()
            .map(|(slot, _)| slot)
            .collect();
        assert_eq!(slots, vec![12, 13]);
    }

    #[test]
    fn test_is_dead() {
        let ledger_path = TempDir::new().unwrap();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put("dead_slots", &5u64.to_be_bytes(), &[1]);
            writer.put("dead_slots", &6u64.to_be_bytes(), &[0]);
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert!(blockstore.is_dead(5).unwrap());
        assert!(!blockstore.is_dead(6).unwrap());
        assert!(!blockstore.is_dead(7).unwrap());
    }

    #[test]
    fn test_completed_data_ranges() {
        let idxs = BTreeSet::from([5u32, 9, 12]);
        // Index 12 is trimmed by consumed=10; the second range begins one
        // index past the first range's beginning.
        assert_eq!(
            Blockstore::get_completed_data_ranges(3, &idxs, 10),
            vec![(3, 5), (4, 9)]
        );
        // Every index below start_index is trimmed as well.
        assert_eq!(
            Blockstore::get_completed_data_ranges(6, &idxs, 13),
            vec![(6, 9), (7, 12)]
        );
        assert_eq!(
            Blockstore::get_completed_data_ranges(0, &BTreeSet::new(), 10),
            vec![]
        );
        // Dense case: the i-th range starts at start_index + i and ends at
        // the i-th surviving completed-data index.
        let idxs = BTreeSet::from([2u32, 5, 8]);
        let ranges = Blockstore::get_completed_data_ranges(0, &idxs, 9);
        assert_eq!(ranges, vec![(0, 2), (1, 5), (2, 8)]);
        for (i, (start, end)) in ranges.iter().enumerate() {
            assert_eq!(*start, i as u32);
            assert_eq!(*end, *idxs.iter().nth(i).unwrap());
        }
    }

    #[test]
    fn test_get_block() {
        solana_logger::setup();
        let ledger_path = TempDir::new().unwrap();
        let slot = 120;
        let transactions = vec![make_transaction(1), make_transaction(2)];
        let block_hash = Hash::new_from_array([7; 32]);
        let entries = vec![Entry {
            num_hashes: 12,
            hash: block_hash,
            transactions: transactions.clone(),
        }];
        {
            let writer = LedgerWriter::create(ledger_path.path());
            write_entries(&writer, slot, &entries, 4);
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();

        let (read_entries, num_shreds, is_full) = blockstore
            .get_slot_entries_with_shred_info(slot, 0, false)
            .unwrap();
        assert_eq!(read_entries, entries);
        assert_eq!(num_shreds, 4);
        assert!(is_full);

        let block = blockstore.get_block(slot).unwrap();
        assert_eq!(
            block,
            Block {
                block_hash,
                parent_slot: Some(119),
                transactions,
            }
        );
    }

    #[test]
    fn test_get_block_multiple_ranges() {
        let ledger_path = TempDir::new().unwrap();
        let slot = 7;
        // Three completed data blocks of one shred each. With every shred
        // flagged data-complete the ranges come out dense ((0,0), (1,1),
        // (2,2)) and each one deserializes its own entry vector.
        let entries: Vec<Entry> = (0u8..3)
            .map(|i| Entry {
                num_hashes: u64::from(i),
                hash: Hash::new_from_array([i; 32]),
                transactions: vec![make_transaction(i)],
            })
            .collect();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            for (index, entry) in entries.iter().enumerate() {
                let payload = bincode::serialize(&vec![entry.clone()]).unwrap();
                let flags = if index == 2 {
                    ShredFlags::LAST_SHRED_IN_SLOT
                } else {
                    ShredFlags::DATA_COMPLETE_SHRED
                };
                writer.put_data_shred(
                    slot,
                    index as u64,
                    &new_serialized_data_shred(0xA5, slot, index as u32, flags, &payload),
                );
            }
            writer.put_slot_meta(&SlotMeta {
                slot,
                consumed: 3,
                received: 3,
                last_index: Some(2),
                parent_slot: Some(6),
                completed_data_indexes: BTreeSet::from([0, 1, 2]),
                ..SlotMeta::default()
            });
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        let block = blockstore.get_block(slot).unwrap();
        // The block hash is the hash of the last entry across all ranges.
        assert_eq!(block.block_hash, entries[2].hash);
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(blockstore.get_slot_entries(slot, 0).unwrap(), entries);

        let (_, num_shreds, is_full) = blockstore
            .get_slot_entries_with_shred_info(slot, 0, false)
            .unwrap();
        assert_eq!(num_shreds, 3);
        assert!(is_full);
    }

    #[test]
    fn test_get_block_not_full() {
        let ledger_path = TempDir::new().unwrap();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put_slot_meta(&SlotMeta {
                slot: 9,
                consumed: 2,
                received: 4,
                last_index: Some(3),
                ..SlotMeta::default()
            });
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_matches!(blockstore.get_block(9), Err(BlockstoreError::NotFound));
        assert_matches!(blockstore.get_block(10), Err(BlockstoreError::NotFound));
    }

    #[test]
    fn test_get_slot_entries_missing_shred() {
        let ledger_path = TempDir::new().unwrap();
        let slot = 33;
        {
            let writer = LedgerWriter::create(ledger_path.path());
            // The meta promises shreds 0..=1, but only shred 0 is present.
            let shred = new_serialized_data_shred(
                0xA5,
                slot,
                0,
                ShredFlags::empty(),
                b"half of an entry",
            );
            writer.put_data_shred(slot, 0, &shred);
            writer.put_slot_meta(&full_slot_meta(slot, 2));
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_matches!(
            blockstore.get_slot_entries(slot, 0),
            Err(BlockstoreError::InvalidShredData(_))
        );
    }

    #[test]
    fn test_get_slot_entries_corrupt_shred() {
        let ledger_path = TempDir::new().unwrap();
        let slot = 34;
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put_data_shred(slot, 0, &[0xEE; 200]);
            writer.put_slot_meta(&full_slot_meta(slot, 1));
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_matches!(
            blockstore.get_slot_entries(slot, 0),
            Err(BlockstoreError::InvalidShredData(_))
        );
    }

    #[test]
    fn test_dead_slot_handling() {
        let ledger_path = TempDir::new().unwrap();
        let slot = 50;
        {
            let writer = LedgerWriter::create(ledger_path.path());
            writer.put("dead_slots", &slot.to_be_bytes(), &[1]);
            writer.put_slot_meta(&SlotMeta {
                slot,
                consumed: 0,
                received: 3,
                ..SlotMeta::default()
            });
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        // The status check only runs when the caller opts in.
        assert_matches!(
            blockstore.get_slot_entries_with_shred_info(slot, 0, true),
            Err(BlockstoreError::DeadSlot)
        );
        assert_matches!(
            blockstore.get_slot_entries_with_shred_info(slot, 0, false),
            Ok((entries, 0, false)) if entries.is_empty()
        );
    }

    #[test]
    fn test_get_slot_entries_unknown_slot() {
        let ledger_path = TempDir::new().unwrap();
        LedgerWriter::create(ledger_path.path());
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();
        assert_eq!(
            blockstore
                .get_slot_entries_with_shred_info(77, 0, false)
                .unwrap(),
            (vec![], 0, false)
        );
    }

    #[test]
    fn test_shred_accessors() {
        let ledger_path = TempDir::new().unwrap();
        let slot = 61;
        let shreds: Vec<Vec<u8>> = (0..3)
            .map(|index| {
                new_serialized_data_shred(
                    0xA5,
                    slot,
                    index,
                    ShredFlags::empty(),
                    format!("shred {index}").as_bytes(),
                )
            })
            .collect();
        {
            let writer = LedgerWriter::create(ledger_path.path());
            for (index, shred) in shreds.iter().enumerate() {
                writer.put_data_shred(slot, index as u64, shred);
            }
            // A shred in the next slot must not leak into slot iteration.
            writer.put_data_shred(
                slot + 1,
                0,
                &new_serialized_data_shred(0xA5, slot + 1, 0, ShredFlags::empty(), b"next"),
            );
            writer.put_coding_shred(slot, 0, &make_coding_shred(slot));
        }
        let blockstore = Blockstore::open_read_only(ledger_path.path()).unwrap();

        assert_eq!(
            blockstore.get_data_shred(slot, 1).unwrap().as_deref(),
            Some(&shreds[1][..])
        );
        assert_eq!(blockstore.get_data_shred(slot, 9).unwrap(), None);
        assert!(blockstore.get_coding_shred(slot, 0).unwrap().is_some());

        let collected: Vec<_> = blockstore.slot_data_iterator(slot, 1).unwrap().collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].0, (slot, 1));
        assert_eq!(collected[1].0, (slot, 2));

        let parsed = blockstore.get_data_shreds_for_slot(slot, 0).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().all(|shred| shred.slot() == slot));
        assert_eq!(parsed[2].data().unwrap(), b"shred 2");

        let parsed = blockstore.get_coding_shreds_for_slot(slot, 0).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_code());
    }

    fn make_coding_shred(slot: Slot) -> Vec<u8> {
        let mut shred = vec![0u8; 64];
        shred.push(0x5A);
        shred.extend_from_slice(&slot.to_le_bytes());
        shred.extend_from_slice(&0u32.to_le_bytes());
        shred.extend_from_slice(&2u16.to_le_bytes());
        shred.extend_from_slice(&0u32.to_le_bytes());
        shred.extend_from_slice(&32u16.to_le_bytes());
        shred.extend_from_slice(&32u16.to_le_bytes());
        shred.extend_from_slice(&0u16.to_le_bytes());
        shred.resize(shred.len() + 64, 0);
        shred
    }

    #[test]
    fn test_secondary_catch_up() {
        let ledger_path = TempDir::new().unwrap();
        let secondary_path = TempDir::new().unwrap();
        let writer = LedgerWriter::create(ledger_path.path());
        writer.put_root(7);

        let blockstore =
            Blockstore::open_secondary(ledger_path.path(), secondary_path.path()).unwrap();
        assert_eq!(blockstore.max_root().unwrap(), 7);

        // Advances only at explicit catch-up calls.
        writer.put_root(42);
        assert_eq!(blockstore.max_root().unwrap(), 7);
        blockstore.try_catch_up_with_primary().unwrap();
        assert_eq!(blockstore.max_root().unwrap(), 42);
    }
}

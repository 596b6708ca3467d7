//! Read-only access to the RocksDB instance underneath a validator's
//! blockstore: column family handles, typed keys, point lookups and
//! iteration. The write side of the database belongs to the validator; this
//! module never creates, mutates or compacts anything.

pub use rocksdb::Direction as IteratorDirection;
use {
    crate::blockstore_meta,
    log::*,
    rocksdb::{
        ColumnFamily, ColumnFamilyDescriptor, DBIterator, DBPinnableSlice, DBRawIterator,
        IteratorMode as RocksIteratorMode, Options, DB,
    },
    serde::de::DeserializeOwned,
    solana_clock::Slot,
    std::{
        collections::HashSet,
        marker::PhantomData,
        path::{Path, PathBuf},
        sync::Arc,
    },
    thiserror::Error,
};

// Column family for metadata about a leader slot
const META_CF: &str = "meta";
// Column family for root data
const ROOT_CF: &str = "root";
// Column family for slots that have been marked as dead
const DEAD_SLOTS_CF: &str = "dead_slots";
// Column family for block height
const BLOCK_HEIGHT_CF: &str = "block_height";
// Column family for data shreds
const DATA_SHRED_CF: &str = "data_shred";
// Column family for coding shreds
const CODE_SHRED_CF: &str = "code_shred";
// The default column is present in every RocksDB database; the blockstore
// stores nothing in it.
const DEFAULT_CF: &str = "default";

macro_rules! convert_column_index_to_key_bytes {
    ($key:ident, $($range:expr => $bytes:expr),* $(,)?) => {{
        let mut key = [0u8; std::mem::size_of::<Self::$key>()];
        debug_assert_eq!(0 $(+$bytes.len())*, key.len());
        $(key[$range].copy_from_slice($bytes);)*
        key
    }};
}

macro_rules! convert_column_key_bytes_to_index {
    ($k:ident, $($a:literal..$b:literal => $f:expr),* $(,)?) => {{
        ($($f(<[u8; $b-$a]>::try_from(&$k[$a..$b]).unwrap())),*)
    }};
}

#[derive(Error, Debug)]
pub enum BlockstoreError {
    #[error("not found")]
    NotFound,
    #[error("dead slot")]
    DeadSlot,
    #[error("invalid shred data")]
    InvalidShredData(bincode::Error),
    #[error("too few data shreds")]
    TooFewDataShreds,
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected column family set: {0} missing")]
    UnexpectedColumnFamilySet(/*column family:*/ &'static str),
}
pub type Result<T> = std::result::Result<T, BlockstoreError>;

/// How to attach to the database directory.
///
/// Both modes tolerate a validator concurrently writing to the directory.
/// A read-only handle is frozen at the snapshot taken when it was opened; a
/// secondary handle can advance to the primary's latest state with
/// [`Rocks::try_catch_up_with_primary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
    ReadOnly,
    /// `secondary_path` is a scratch directory where the secondary instance
    /// keeps its own info logs.
    Secondary { secondary_path: PathBuf },
}

pub enum IteratorMode<Index> {
    Start,
    End,
    From(Index, IteratorDirection),
}

pub mod columns {
    #[derive(Debug)]
    /// The slot metadata column.
    ///
    /// This column family tracks the status of the received shred data for a
    /// given slot, and in particular the completed data ranges a full slot
    /// can be reassembled from.
    ///
    /// * index type: `u64` (see [`SlotColumn`](super::SlotColumn))
    /// * value type: [`crate::blockstore_meta::SlotMeta`]
    pub struct SlotMeta;

    #[derive(Debug)]
    /// The root column.
    ///
    /// Slots on the main fork are inserted into this column when they are
    /// finalized. Key existence is what marks a slot rooted; the value
    /// carries no information.
    ///
    /// * index type: `u64` (see [`SlotColumn`](super::SlotColumn))
    pub struct Root;

    #[derive(Debug)]
    /// The dead slots column.
    ///
    /// A slot is marked dead if the validator decided it will never be able
    /// to successfully replay it, e.g. after observing an equivocating
    /// leader. The value is the single byte `1`.
    ///
    /// * index type: `u64` (see [`SlotColumn`](super::SlotColumn))
    pub struct DeadSlots;

    #[derive(Debug)]
    /// The block height column.
    ///
    /// * index type: `u64` (see [`SlotColumn`](super::SlotColumn))
    /// * value type: `u64`
    pub struct BlockHeight;

    #[derive(Debug)]
    /// The shred data column
    ///
    /// * index type: `(u64, u64)`
    /// * value type: raw shred bytes
    pub struct ShredData;

    #[derive(Debug)]
    /// The shred erasure code column
    ///
    /// * index type: `(u64, u64)`
    /// * value type: raw shred bytes
    pub struct ShredCode;
}

#[derive(Debug)]
pub(crate) struct Rocks {
    db: DB,
}

impl Rocks {
    pub(crate) fn open(path: &Path, access_type: AccessType) -> Result<Rocks> {
        let db_options = get_db_options();

        // Opening would fail with an opaque engine error if the directory
        // does not hold every column family this client understands, so
        // check the on-disk set up front. Extra columns written by newer
        // validators are fine; read-only and secondary instances need not
        // open every column.
        let detected_cfs: HashSet<String> = DB::list_cf(&Options::default(), path)
            .map_err(BlockstoreError::RocksDb)?
            .into_iter()
            .collect();
        for cf_name in Self::columns() {
            if !detected_cfs.contains(cf_name) {
                return Err(BlockstoreError::UnexpectedColumnFamilySet(cf_name));
            }
        }

        let db = match &access_type {
            AccessType::ReadOnly => DB::open_cf_descriptors_read_only(
                &db_options,
                path,
                Self::cf_descriptors(),
                /*error_if_log_file_exist:*/ false,
            )?,
            AccessType::Secondary { secondary_path } => {
                info!(
                    "Opening Rocks with secondary (read only) access at: {secondary_path:?}. \
                     This secondary access could temporarily degrade other accesses, such as \
                     by the validator"
                );
                DB::open_cf_descriptors_as_secondary(
                    &db_options,
                    path,
                    secondary_path,
                    Self::cf_descriptors(),
                )?
            }
        };

        Ok(Rocks { db })
    }

    /// Create the column family (CF) descriptors necessary to open the
    /// database. All columns use default options; the validator that owns
    /// the directory is the one that tunes them.
    fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
        Self::columns()
            .iter()
            .map(|cf_name| ColumnFamilyDescriptor::new(*cf_name, Options::default()))
            .collect()
    }

    const fn columns() -> [&'static str; 7] {
        use columns::*;
        [
            DEFAULT_CF,
            SlotMeta::NAME,
            Root::NAME,
            DeadSlots::NAME,
            BlockHeight::NAME,
            ShredData::NAME,
            ShredCode::NAME,
        ]
    }

    pub(crate) fn column<C>(self: &Arc<Self>) -> LedgerColumn<C>
    where
        C: Column + ColumnName,
    {
        LedgerColumn {
            backend: Arc::clone(self),
            column: PhantomData,
        }
    }

    pub(crate) fn cf_handle(&self, cf: &str) -> &ColumnFamily {
        self.db
            .cf_handle(cf)
            .expect("should never get an unknown column")
    }

    fn get_pinned_cf(
        &self,
        cf: &ColumnFamily,
        key: impl AsRef<[u8]>,
    ) -> Result<Option<DBPinnableSlice>> {
        let opt = self.db.get_pinned_cf(cf, key)?;
        Ok(opt)
    }

    fn multi_get_cf<'a, K, I>(
        &self,
        cf: &ColumnFamily,
        keys: I,
    ) -> impl Iterator<Item = Result<Option<DBPinnableSlice>>>
    where
        K: AsRef<[u8]> + 'a + ?Sized,
        I: IntoIterator<Item = &'a K>,
    {
        self.db
            .batched_multi_get_cf(cf, keys, /*sorted_input:*/ false)
            .into_iter()
            .map(|out| out.map_err(BlockstoreError::RocksDb))
    }

    pub(crate) fn iterator_cf(
        &self,
        cf: &ColumnFamily,
        iterator_mode: RocksIteratorMode,
    ) -> DBIterator {
        self.db.iterator_cf(cf, iterator_mode)
    }

    pub(crate) fn raw_iterator_cf(&self, cf: &ColumnFamily) -> Result<DBRawIterator> {
        Ok(self.db.raw_iterator_cf(cf))
    }

    /// Advances a secondary instance to the primary's latest state.
    ///
    /// Reads served before and after observe two different point-in-time
    /// snapshots; callers that need one consistent view must serialize their
    /// reads against this call.
    pub(crate) fn try_catch_up_with_primary(&self) -> Result<()> {
        self.db.try_catch_up_with_primary()?;
        Ok(())
    }
}

/// Lists the column families present in the database directory without
/// attaching to it.
pub fn list_column_family_names(path: &Path) -> Result<Vec<String>> {
    let names = DB::list_cf(&Options::default(), path)?;
    Ok(names)
}

pub trait Column {
    type Index;
    type Key: AsRef<[u8]>;

    fn key(index: &Self::Index) -> Self::Key;
    fn index(key: &[u8]) -> Self::Index;
}

pub trait ColumnName {
    const NAME: &'static str;
}

pub trait TypedColumn: Column {
    type Type: DeserializeOwned;

    fn deserialize(data: &[u8]) -> Result<Self::Type> {
        Ok(bincode::deserialize(data)?)
    }
}

/// SlotColumn is a trait for slot-based column families.  Its index is
/// essentially Slot (or more generally speaking, has a 1:1 mapping to Slot).
pub trait SlotColumn<Index = Slot> {}

impl<T: SlotColumn> Column for T {
    type Index = Slot;
    type Key = [u8; std::mem::size_of::<Slot>()];

    /// Converts a Slot to its RocksDB key.
    #[inline]
    fn key(slot: &Self::Index) -> Self::Key {
        slot.to_be_bytes()
    }

    /// Converts a RocksDB key to its u64 Index.
    fn index(key: &[u8]) -> Self::Index {
        convert_column_key_bytes_to_index!(key, 0..8 => Slot::from_be_bytes)
    }
}

impl SlotColumn for columns::SlotMeta {}
impl ColumnName for columns::SlotMeta {
    const NAME: &'static str = META_CF;
}
impl TypedColumn for columns::SlotMeta {
    type Type = blockstore_meta::SlotMeta;
}

impl SlotColumn for columns::Root {}
impl ColumnName for columns::Root {
    const NAME: &'static str = ROOT_CF;
}

impl SlotColumn for columns::DeadSlots {}
impl ColumnName for columns::DeadSlots {
    const NAME: &'static str = DEAD_SLOTS_CF;
}

impl SlotColumn for columns::BlockHeight {}
impl ColumnName for columns::BlockHeight {
    const NAME: &'static str = BLOCK_HEIGHT_CF;
}
impl TypedColumn for columns::BlockHeight {
    type Type = u64;
}

impl Column for columns::ShredData {
    type Index = (Slot, /*shred index:*/ u64);
    type Key = [u8; std::mem::size_of::<Slot>() + std::mem::size_of::<u64>()];

    #[inline]
    fn key((slot, index): &Self::Index) -> Self::Key {
        convert_column_index_to_key_bytes!(Key,
            ..8 => &slot.to_be_bytes(),
            8.. => &index.to_be_bytes(),
        )
    }

    fn index(key: &[u8]) -> Self::Index {
        convert_column_key_bytes_to_index!(key,
            0..8  => Slot::from_be_bytes,
            8..16 => u64::from_be_bytes,  // shred index
        )
    }
}
impl ColumnName for columns::ShredData {
    const NAME: &'static str = DATA_SHRED_CF;
}

impl Column for columns::ShredCode {
    type Index = (Slot, /*shred index:*/ u64);
    type Key = <columns::ShredData as Column>::Key;

    #[inline]
    fn key(index: &Self::Index) -> Self::Key {
        // ShredCode and ShredData have the same key format
        <columns::ShredData as Column>::key(index)
    }

    fn index(key: &[u8]) -> Self::Index {
        columns::ShredData::index(key)
    }
}
impl ColumnName for columns::ShredCode {
    const NAME: &'static str = CODE_SHRED_CF;
}

#[derive(Debug)]
pub struct LedgerColumn<C: Column + ColumnName> {
    backend: Arc<Rocks>,
    column: PhantomData<C>,
}

impl<C> LedgerColumn<C>
where
    C: Column + ColumnName,
{
    #[inline]
    pub fn handle(&self) -> &ColumnFamily {
        self.backend.cf_handle(C::NAME)
    }

    pub fn get_bytes(&self, index: C::Index) -> Result<Option<Vec<u8>>> {
        let key = <C as Column>::key(&index);
        let value = self.backend.get_pinned_cf(self.handle(), key)?;
        Ok(value.as_deref().map(<[u8]>::to_vec))
    }

    /// Create a key type suitable for use with multi_get(). The function
    /// returns an iterator, so the keys must be created with a separate
    /// function in order to live long enough.
    pub(crate) fn multi_get_keys<I>(&self, keys: I) -> Vec<<C as Column>::Key>
    where
        I: IntoIterator<Item = C::Index>,
    {
        keys.into_iter().map(|index| C::key(&index)).collect()
    }

    pub fn iter(
        &self,
        iterator_mode: IteratorMode<C::Index>,
    ) -> Result<impl Iterator<Item = (C::Index, Box<[u8]>)> + '_> {
        let start_key: <C as Column>::Key;
        let iterator_mode = match iterator_mode {
            IteratorMode::Start => RocksIteratorMode::Start,
            IteratorMode::End => RocksIteratorMode::End,
            IteratorMode::From(start, direction) => {
                start_key = <C as Column>::key(&start);
                RocksIteratorMode::From(start_key.as_ref(), direction)
            }
        };

        let iter = self.backend.iterator_cf(self.handle(), iterator_mode);
        Ok(iter.map(|pair| {
            let (key, value) = pair.unwrap();
            (C::index(&key), value)
        }))
    }

    /// A cursor style iterator over the column; the value slices it hands
    /// out alias the engine's block cache and are released when the cursor
    /// moves or drops.
    pub(crate) fn raw_iterator(&self) -> Result<DBRawIterator> {
        self.backend.raw_iterator_cf(self.handle())
    }
}

impl<C> LedgerColumn<C>
where
    C: TypedColumn + ColumnName,
{
    pub(crate) fn multi_get<'a, K>(
        &'a self,
        keys: impl IntoIterator<Item = &'a K> + 'a,
    ) -> impl Iterator<Item = Result<Option<C::Type>>> + 'a
    where
        K: AsRef<[u8]> + 'a + ?Sized,
    {
        self.backend
            .multi_get_cf(self.handle(), keys)
            .map(|out| out?.as_deref().map(C::deserialize).transpose())
    }

    pub fn get(&self, index: C::Index) -> Result<Option<C::Type>> {
        let key = <C as Column>::key(&index);
        if let Some(pinnable_slice) = self.backend.get_pinned_cf(self.handle(), key)? {
            let value = C::deserialize(pinnable_slice.as_ref())?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }
}

fn get_db_options() -> Options {
    let mut options = Options::default();
    // Allow Rocks to open/keep open as many files as it needs for
    // performance; however, this is also explicitly required for a secondary
    // instance. See https://github.com/facebook/rocksdb/wiki/Secondary-instance
    options.set_max_open_files(-1);
    options
}

//! The `shred` module parses the MTU sized data frames a validator stages in
//! its blockstore. There are two types of shreds: data and coding. Data
//! shreds contain entry information while coding shreds provide redundancy to
//! protect against dropped network packets (erasures).
//!
//! +---------------------------------------------------------------------------------------------+
//! | Data Shred                                                                                  |
//! +---------------------------------------------------------------------------------------------+
//! | common       | data       | payload                                                         |
//! | header       | header     |                                                                 |
//! |+---+---+---  |+---+---+---|+----------------------------------------------------------+----+|
//! || s | s | .   || p | f | s || data (ie ledger entries)                                 | r  ||
//! || i | h | .   || a | l | i ||                                                          | e  ||
//! || g | r | .   || r | a | z || Legacy data shreds are zero padded past the data; Merkle | s  ||
//! || n | e |     || e | g | e || data shreds carry the proof entries there instead.       | t  ||
//! || a | d |     || n | s |   ||                                                          | r  ||
//! || t |   |     || t |   |   ||                                                          | i  ||
//! || u | t |     ||   |   |   ||                                                          | c  ||
//! || r | y |     || o |   |   ||                                                          | t  ||
//! || e | p |     || f |   |   ||                                                          | e  ||
//! ||   | e |     || f |   |   ||                                                          | d  ||
//! |+---+---+---  |+---+---+---+|----------------------------------------------------------+----+|
//! +---------------------------------------------------------------------------------------------+
//!
//! Coding shreds are identical up to the variant byte and carry a coding
//! header (FEC set geometry) where data shreds carry the data header.
//!
//! This client only reads shreds back out of the blockstore: it never
//! produces, signs, or erasure-recovers them, and it does not verify
//! signatures or Merkle proofs. The producer is the local validator.

pub use self::{shred_code::ShredCode, shred_data::ShredData};
use {
    self::traits::Shred as _,
    bincode::Options,
    bitflags::bitflags,
    num_enum::{IntoPrimitive, TryFromPrimitive},
    serde::{Deserialize, Serialize},
    solana_clock::Slot,
    solana_signature::Signature,
    static_assertions::const_assert_eq,
    thiserror::Error,
};

mod common;
mod legacy;
mod merkle;
mod shred_code;
mod shred_data;
mod traits;

/// The following constants are computed by hand, and hardcoded.
/// `test_shred_constants` ensures that the values are correct.
const SIZE_OF_COMMON_SHRED_HEADER: usize = 83;
const SIZE_OF_DATA_SHRED_HEADERS: usize = 88;
const SIZE_OF_CODING_SHRED_HEADERS: usize = 89;
const SIZE_OF_SIGNATURE: usize = 64;

const OFFSET_OF_SHRED_VARIANT: usize = SIZE_OF_SIGNATURE;

/// Maximum over-the-wire size of a shred: 1280 byte IPv6 minimum MTU minus
/// 48 bytes of IPv6/UDP headers. Bounds header deserialization so corrupt
/// length fields cannot trigger large allocations.
const PACKET_DATA_SIZE: usize = 1232;

// LAST_SHRED_IN_SLOT also implies DATA_COMPLETE_SHRED.
// So it cannot be LAST_SHRED_IN_SLOT if not also DATA_COMPLETE_SHRED.
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
    pub struct ShredFlags:u8 {
        const SHRED_TICK_REFERENCE_MASK = 0b0011_1111;
        const DATA_COMPLETE_SHRED       = 0b0100_0000;
        const LAST_SHRED_IN_SLOT        = 0b1100_0000;
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
    #[error("Invalid data size: {size}, payload: {payload}")]
    InvalidDataSize { size: u16, payload: usize },
    #[error("Invalid payload size: {0}")]
    InvalidPayloadSize(/*payload size:*/ usize),
    #[error("Invalid shred type")]
    InvalidShredType,
    #[error("Invalid shred variant")]
    InvalidShredVariant,
    #[error("Too few data shreds")]
    TooFewDataShreds,
}

#[repr(u8)]
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, IntoPrimitive, Serialize, TryFromPrimitive,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum ShredType {
    Data = 0b1010_0101,
    Code = 0b0101_1010,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ShredVariant {
    LegacyCode, // 0b0101_1010
    LegacyData, // 0b1010_0101
    // proof_size is the number of Merkle proof entries, and is encoded in the
    // lowest 4 bits of the binary representation. The first 4 bits identify
    // the shred variant:
    //   0b0100_????  MerkleCode
    //   0b1000_????  MerkleData
    MerkleCode { proof_size: u8 }, // 0b0100_????
    MerkleData { proof_size: u8 }, // 0b1000_????
}

/// A common header that is present in data and code shred headers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShredCommonHeader {
    pub signature: Signature,
    pub shred_variant: ShredVariant,
    pub slot: Slot,
    pub index: u32,
    pub version: u16,
    pub fec_set_index: u32,
}

/// The data shred header has parent offset and flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataShredHeader {
    pub parent_offset: u16,
    pub flags: ShredFlags,
    pub size: u16, // common shred header + data shred header + data
}

/// The coding shred header has FEC information
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CodingShredHeader {
    pub num_data_shreds: u16,
    pub num_coding_shreds: u16,
    pub position: u16, // [0..num_coding_shreds)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Shred {
    ShredCode(ShredCode),
    ShredData(ShredData),
}

use common::dispatch;

impl Shred {
    dispatch!(pub fn common_header(&self) -> &ShredCommonHeader);
    dispatch!(pub fn payload(&self) -> &Vec<u8>);

    /// Parses a shred as read back from the blockstore.
    pub fn new_from_serialized_shred(shred: Vec<u8>) -> Result<Self, Error> {
        Ok(match get_shred_variant(&shred)? {
            ShredVariant::LegacyCode => {
                let shred = legacy::ShredCode::from_payload(shred)?;
                Self::from(ShredCode::from(shred))
            }
            ShredVariant::LegacyData => {
                let shred = legacy::ShredData::from_payload(shred)?;
                Self::from(ShredData::from(shred))
            }
            ShredVariant::MerkleCode { .. } => {
                let shred = merkle::ShredCode::from_payload(shred)?;
                Self::from(ShredCode::from(shred))
            }
            ShredVariant::MerkleData { .. } => {
                let shred = merkle::ShredData::from_payload(shred)?;
                Self::from(ShredData::from(shred))
            }
        })
    }

    #[inline]
    pub fn slot(&self) -> Slot {
        self.common_header().slot
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.common_header().index
    }

    #[inline]
    pub fn version(&self) -> u16 {
        self.common_header().version
    }

    #[inline]
    pub fn fec_set_index(&self) -> u32 {
        self.common_header().fec_set_index
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.common_header().signature
    }

    #[inline]
    pub fn shred_type(&self) -> ShredType {
        ShredType::from(self.common_header().shred_variant)
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        matches!(self, Self::ShredData(_))
    }

    #[inline]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::ShredCode(_))
    }

    /// The ledger-entry bytes carried by a data shred.
    pub fn data(&self) -> Result<&[u8], Error> {
        match self {
            Self::ShredCode(_) => Err(Error::InvalidShredType),
            Self::ShredData(shred) => shred.data(),
        }
    }

    /// Whether this data shred ends a run of shreds that deserializes into
    /// whole entries. Always false for coding shreds.
    pub fn data_complete(&self) -> bool {
        match self {
            Self::ShredCode(_) => false,
            Self::ShredData(shred) => shred.data_complete(),
        }
    }

    /// Whether this data shred is the last one in its slot.
    pub fn last_in_slot(&self) -> bool {
        match self {
            Self::ShredCode(_) => false,
            Self::ShredData(shred) => shred.last_in_slot(),
        }
    }
}

impl From<ShredCode> for Shred {
    fn from(shred: ShredCode) -> Self {
        Self::ShredCode(shred)
    }
}

impl From<ShredData> for Shred {
    fn from(shred: ShredData) -> Self {
        Self::ShredData(shred)
    }
}

impl From<ShredVariant> for ShredType {
    #[inline]
    fn from(shred_variant: ShredVariant) -> Self {
        match shred_variant {
            ShredVariant::LegacyCode => ShredType::Code,
            ShredVariant::LegacyData => ShredType::Data,
            ShredVariant::MerkleCode { .. } => ShredType::Code,
            ShredVariant::MerkleData { .. } => ShredType::Data,
        }
    }
}

impl From<ShredVariant> for u8 {
    fn from(shred_variant: ShredVariant) -> u8 {
        match shred_variant {
            ShredVariant::LegacyCode => u8::from(ShredType::Code),
            ShredVariant::LegacyData => u8::from(ShredType::Data),
            ShredVariant::MerkleCode { proof_size } => proof_size | 0x40,
            ShredVariant::MerkleData { proof_size } => proof_size | 0x80,
        }
    }
}

impl TryFrom<u8> for ShredVariant {
    type Error = Error;
    fn try_from(shred_variant: u8) -> Result<Self, Self::Error> {
        if shred_variant == u8::from(ShredType::Code) {
            Ok(ShredVariant::LegacyCode)
        } else if shred_variant == u8::from(ShredType::Data) {
            Ok(ShredVariant::LegacyData)
        } else {
            let proof_size = shred_variant & 0x0F;
            match shred_variant & 0xF0 {
                0x40 => Ok(ShredVariant::MerkleCode { proof_size }),
                0x80 => Ok(ShredVariant::MerkleData { proof_size }),
                _ => Err(Error::InvalidShredVariant),
            }
        }
    }
}

#[inline]
fn get_shred_variant(shred: &[u8]) -> Result<ShredVariant, Error> {
    let Some(&shred_variant) = shred.get(OFFSET_OF_SHRED_VARIANT) else {
        return Err(Error::InvalidPayloadSize(shred.len()));
    };
    ShredVariant::try_from(shred_variant)
}

// Like bincode::deserialize_from but bounds the internal allocation limit by
// the size of a packet.
fn deserialize_from_with_limit<R, T>(reader: R) -> bincode::Result<T>
where
    R: std::io::Read,
    T: serde::de::DeserializeOwned,
{
    bincode::options()
        .with_limit(PACKET_DATA_SIZE as u64)
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize_from(reader)
}

/// Reassembles the serialized entry buffer from an ordered run of data
/// shreds.
///
/// The shreds must be strictly consecutive by index and the run must be
/// terminated by a shred flagged DATA_COMPLETE_SHRED (or LAST_SHRED_IN_SLOT,
/// which implies it); anything else fails with [`Error::TooFewDataShreds`].
/// There is no dedup and no erasure recovery: every shred of the run has to
/// be present in the input.
pub fn deshred(shreds: &[Shred]) -> Result<Vec<u8>, Error> {
    let index = shreds.first().ok_or(Error::TooFewDataShreds)?.index();
    let aligned = shreds.iter().zip(index..).all(|(s, i)| s.index() == i);
    let data_complete = {
        let shred = shreds.last().unwrap();
        shred.data_complete() || shred.last_in_slot()
    };
    if !data_complete || !aligned {
        return Err(Error::TooFewDataShreds);
    }
    let data: Vec<_> = shreds.iter().map(Shred::data).collect::<Result<_, _>>()?;
    Ok(data.into_iter().flatten().copied().collect())
}

const_assert_eq!(SIZE_OF_DATA_SHRED_HEADERS, SIZE_OF_COMMON_SHRED_HEADER + 5);
const_assert_eq!(SIZE_OF_CODING_SHRED_HEADERS, SIZE_OF_COMMON_SHRED_HEADER + 6);

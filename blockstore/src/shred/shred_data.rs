use crate::shred::{
    common::dispatch_variant,
    legacy, merkle,
    traits::{Shred as _, ShredData as _},
    DataShredHeader, Error, ShredCommonHeader, ShredFlags, SIZE_OF_DATA_SHRED_HEADERS,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShredData {
    Legacy(legacy::ShredData),
    Merkle(merkle::ShredData),
}

impl ShredData {
    dispatch_variant!(pub(super) fn common_header(&self) -> &ShredCommonHeader);
    dispatch_variant!(pub(super) fn payload(&self) -> &Vec<u8>);
    dispatch_variant!(pub fn data_header(&self) -> &DataShredHeader);
    dispatch_variant!(pub fn data(&self) -> Result<&[u8], Error>);

    pub fn last_in_slot(&self) -> bool {
        let flags = self.data_header().flags;
        flags.contains(ShredFlags::LAST_SHRED_IN_SLOT)
    }

    pub fn data_complete(&self) -> bool {
        let flags = self.data_header().flags;
        flags.contains(ShredFlags::DATA_COMPLETE_SHRED)
    }

    pub fn reference_tick(&self) -> u8 {
        let flags = self.data_header().flags;
        (flags & ShredFlags::SHRED_TICK_REFERENCE_MASK).bits()
    }
}

impl From<legacy::ShredData> for ShredData {
    fn from(shred: legacy::ShredData) -> Self {
        Self::Legacy(shred)
    }
}

impl From<merkle::ShredData> for ShredData {
    fn from(shred: merkle::ShredData) -> Self {
        Self::Merkle(shred)
    }
}

// The bytes between the data header and data_header.size; everything past
// that (legacy zero padding or the Merkle proof trailer) is excluded.
#[inline]
pub(super) fn get_data(payload: &[u8], size: u16) -> Result<&[u8], Error> {
    let data_end = usize::from(size);
    if !(SIZE_OF_DATA_SHRED_HEADERS..=payload.len()).contains(&data_end) {
        return Err(Error::InvalidDataSize {
            size,
            payload: payload.len(),
        });
    }
    Ok(&payload[SIZE_OF_DATA_SHRED_HEADERS..data_end])
}

use crate::shred::{CodingShredHeader, DataShredHeader, Error, ShredCommonHeader};

pub(super) trait Shred: Sized {
    // Size of both common and per-type (data or coding) headers.
    const SIZE_OF_HEADERS: usize;

    fn from_payload(shred: Vec<u8>) -> Result<Self, Error>;
    fn common_header(&self) -> &ShredCommonHeader;
    fn payload(&self) -> &Vec<u8>;
    fn sanitize(&self) -> Result<(), Error>;
}

pub(super) trait ShredData: Shred {
    fn data_header(&self) -> &DataShredHeader;
    fn data(&self) -> Result<&[u8], Error>;
}

pub(super) trait ShredCode: Shred {
    fn coding_header(&self) -> &CodingShredHeader;
}

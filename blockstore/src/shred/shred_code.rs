use crate::shred::{
    common::dispatch_variant,
    legacy, merkle,
    traits::{Shred as _, ShredCode as _},
    CodingShredHeader, ShredCommonHeader,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShredCode {
    Legacy(legacy::ShredCode),
    Merkle(merkle::ShredCode),
}

impl ShredCode {
    dispatch_variant!(pub(super) fn common_header(&self) -> &ShredCommonHeader);
    dispatch_variant!(pub(super) fn payload(&self) -> &Vec<u8>);
    dispatch_variant!(pub fn coding_header(&self) -> &CodingShredHeader);
}

impl From<legacy::ShredCode> for ShredCode {
    fn from(shred: legacy::ShredCode) -> Self {
        Self::Legacy(shred)
    }
}

impl From<merkle::ShredCode> for ShredCode {
    fn from(shred: merkle::ShredCode) -> Self {
        Self::Merkle(shred)
    }
}

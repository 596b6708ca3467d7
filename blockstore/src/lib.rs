//! A read-only client for the blockstore database (RocksDB) written by a
//! Solana validator.
//!
//! The validator stages every slot as erasure-coded fragments ("shreds")
//! before replaying it; this crate attaches to the database directory of a
//! running or stopped validator and serves metadata lookups, raw shred
//! access, and block reconstruction from those fragments.

pub mod blockstore;
pub mod blockstore_db;
pub mod blockstore_meta;
pub mod shred;

pub use crate::{
    blockstore::{Block, Blockstore},
    blockstore_db::{BlockstoreError, Result},
    blockstore_meta::SlotMeta,
};

//! Basic counterpart to the validator's ledger tool for databases this
//! client understands. Requested info is dumped in YAML format.

use {
    base64::{prelude::BASE64_STANDARD, Engine},
    clap::Parser,
    log::error,
    serde::Serialize,
    solana_blockstore::{
        blockstore::list_column_family_names, Block, Blockstore, SlotMeta,
    },
    solana_clock::Slot,
    std::{collections::BTreeMap, path::PathBuf, process::exit},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to ledger/rocksdb dir
    #[arg(long, value_name = "DIR")]
    db: PathBuf,

    /// List column families
    #[arg(long)]
    list_cfs: bool,

    /// Show root slot
    #[arg(long)]
    root: bool,

    /// Show block height
    #[arg(long)]
    height: bool,

    /// Get all slot metadatas
    #[arg(long)]
    all_slots: bool,

    /// Get slot metadata
    #[arg(long, value_name = "SLOT")]
    slot: Vec<Slot>,

    /// Get block
    #[arg(long, value_name = "SLOT")]
    block: Option<Slot>,

    /// Dump data shreds (`slot` or `slot:index`)
    #[arg(long, value_name = "SLOT[:INDEX]")]
    data_shreds: Option<String>,

    /// Dump coding shreds (`slot` or `slot:index`)
    #[arg(long, value_name = "SLOT[:INDEX]")]
    coding_shreds: Option<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut ok = true;

    if args.list_cfs {
        ok &= list_column_families(&args.db);
    }

    let blockstore = match Blockstore::open_read_only(&args.db) {
        Ok(blockstore) => blockstore,
        Err(err) => {
            error!("Failed to open blockstore: {err}");
            exit(1);
        }
    };

    if args.root {
        ok &= show_root(&blockstore);
    }
    if args.height {
        ok &= show_block_height(&blockstore);
    }
    if args.all_slots {
        ok &= dump_all_slot_metas(&blockstore);
    } else if !args.slot.is_empty() {
        ok &= dump_slot_metas(&blockstore, &args.slot);
    }
    if let Some(slot) = args.block {
        ok &= dump_block(&blockstore, slot);
    }
    if let Some(shred_ref) = &args.data_shreds {
        ok &= dump_shreds(&blockstore, shred_ref, /*coding:*/ false);
    }
    if let Some(shred_ref) = &args.coding_shreds {
        ok &= dump_shreds(&blockstore, shred_ref, /*coding:*/ true);
    }

    if !ok {
        exit(1);
    }
}

fn print_yaml<T: Serialize>(value: &T) {
    match serde_yaml::to_string(value) {
        Ok(out) => print!("{out}"),
        Err(err) => error!("Failed to encode YAML: {err}"),
    }
}

fn list_column_families(path: &std::path::Path) -> bool {
    #[derive(Serialize)]
    struct Output {
        column_families: Vec<String>,
    }
    match list_column_family_names(path) {
        Ok(column_families) => {
            print_yaml(&Output { column_families });
            true
        }
        Err(err) => {
            error!("Failed to list column families: {err}");
            false
        }
    }
}

fn show_root(blockstore: &Blockstore) -> bool {
    match blockstore.max_root() {
        Ok(root) => {
            println!("root: {root}");
            true
        }
        Err(err) => {
            error!("Failed to get root: {err}");
            false
        }
    }
}

fn show_block_height(blockstore: &Blockstore) -> bool {
    match blockstore.get_block_height() {
        Ok(height) => {
            println!("block_height: {height}");
            true
        }
        Err(err) => {
            error!("Failed to get block height: {err}");
            false
        }
    }
}

#[derive(Serialize)]
struct SlotMetaOutput {
    slots: BTreeMap<Slot, SlotMeta>,
}

fn dump_all_slot_metas(blockstore: &Blockstore) -> bool {
    #[derive(Serialize)]
    struct RangeOutput {
        first: Slot,
        last: Slot,
    }
    let iter = match blockstore.slot_meta_iterator(0) {
        Ok(iter) => iter,
        Err(err) => {
            error!("Failed to iterate slot metas: {err}");
            return false;
        }
    };
    let slots: BTreeMap<Slot, SlotMeta> = iter.collect();
    if let (Some(first), Some(last)) = (slots.keys().next(), slots.keys().next_back()) {
        let mut slot_meta_range = BTreeMap::new();
        slot_meta_range.insert(
            "slot_meta_range",
            RangeOutput {
                first: *first,
                last: *last,
            },
        );
        print_yaml(&slot_meta_range);
    }
    print_yaml(&SlotMetaOutput { slots });
    true
}

fn dump_slot_metas(blockstore: &Blockstore, slots: &[Slot]) -> bool {
    let metas = match blockstore.multi_get_slot_meta(slots) {
        Ok(metas) => metas,
        Err(err) => {
            error!("Failed to get slot metas: {err}");
            return false;
        }
    };
    let mut ok = true;
    let mut found = BTreeMap::new();
    for (slot, meta) in slots.iter().zip(metas) {
        match meta {
            Some(meta) => {
                found.insert(*slot, meta);
            }
            None => {
                error!("No slot meta for slot {slot}");
                ok = false;
            }
        }
    }
    print_yaml(&SlotMetaOutput { slots: found });
    ok
}

#[derive(Serialize)]
struct TransactionOutput {
    signatures: Vec<String>,
}

#[derive(Serialize)]
struct BlockOutput {
    block_hash: String,
    parent_slot: Option<Slot>,
    num_transactions: usize,
    transactions: Vec<TransactionOutput>,
}

fn dump_block(blockstore: &Blockstore, slot: Slot) -> bool {
    let Block {
        block_hash,
        parent_slot,
        transactions,
    } = match blockstore.get_block(slot) {
        Ok(block) => block,
        Err(err) => {
            error!("Failed to get block {slot}: {err}");
            return false;
        }
    };
    let transactions: Vec<TransactionOutput> = transactions
        .iter()
        .map(|tx| TransactionOutput {
            signatures: tx.signatures.iter().map(|sig| sig.to_string()).collect(),
        })
        .collect();
    let mut blocks = BTreeMap::new();
    blocks.insert(
        slot,
        BlockOutput {
            block_hash: block_hash.to_string(),
            parent_slot,
            num_transactions: transactions.len(),
            transactions,
        },
    );
    let mut output = BTreeMap::new();
    output.insert("blocks", blocks);
    print_yaml(&output);
    true
}

fn parse_shred_ref(shred_ref: &str) -> Option<(Slot, Option<u64>)> {
    match shred_ref.split_once(':') {
        Some((slot, index)) => {
            let slot = slot.parse().ok()?;
            let index = index.parse().ok()?;
            Some((slot, Some(index)))
        }
        None => Some((shred_ref.parse().ok()?, None)),
    }
}

fn dump_shreds(blockstore: &Blockstore, shred_ref: &str, coding: bool) -> bool {
    let kind = if coding { "coding_shred" } else { "data_shred" };
    let Some((slot, index)) = parse_shred_ref(shred_ref) else {
        error!("Invalid shred reference: {shred_ref}");
        return false;
    };

    let mut shreds = BTreeMap::new();
    match index {
        Some(index) => {
            let shred = if coding {
                blockstore.get_coding_shred(slot, index)
            } else {
                blockstore.get_data_shred(slot, index)
            };
            match shred {
                Ok(Some(payload)) => {
                    shreds.insert(index, BASE64_STANDARD.encode(payload));
                }
                Ok(None) => {
                    error!("No such shred: {shred_ref}");
                    return false;
                }
                Err(err) => {
                    error!("Can't get shred {shred_ref}: {err}");
                    return false;
                }
            }
        }
        None => {
            let collected = if coding {
                blockstore
                    .slot_coding_iterator(slot, 0)
                    .map(|iter| iter.collect::<Vec<_>>())
            } else {
                blockstore
                    .slot_data_iterator(slot, 0)
                    .map(|iter| iter.collect::<Vec<_>>())
            };
            match collected {
                Ok(collected) => {
                    for ((_, index), payload) in collected {
                        shreds.insert(index, BASE64_STANDARD.encode(payload));
                    }
                }
                Err(err) => {
                    error!("Can't iterate shreds of slot {slot}: {err}");
                    return false;
                }
            }
        }
    }

    let mut by_slot = BTreeMap::new();
    by_slot.insert(slot, shreds);
    let mut output = BTreeMap::new();
    output.insert(kind, by_slot);
    print_yaml(&output);
    true
}

//! Read-only state dump tool.
//!
//! Opens a `sled` data directory and prints a summary of the accepted view
//! the way `migrate_db` walks an existing tree key-by-key to report what it
//! finds, without ever opening a write batch. Useful for inspecting a node's
//! database offline — after a crash, or before filing a bug report — without
//! spinning up the whole VM and its builder/mempool machinery.

use std::path::PathBuf;

use clap::Parser;
use platformvm::chain_record::ChainRecord;
use platformvm::codec;
use platformvm::ids::Id;
use platformvm::staker::Staker;
use platformvm::state::sled_store::SledStore;
use platformvm::state::{keys, PersistentStore};
use platformvm::supernet::Supernet;

#[derive(Parser, Debug)]
#[command(name = "pvm-dump")]
#[command(about = "Dump the contents of a platformvm sled data directory")]
struct Args {
    /// Path to an existing sled data directory.
    #[arg(long)]
    data_dir: PathBuf,

    /// Print every staker, supernet and chain record instead of just counts.
    #[arg(long)]
    verbose: bool,
}

fn decode_or_warn<T: serde::de::DeserializeOwned>(label: &str, bytes: &[u8]) -> Option<T> {
    match codec::decode(bytes) {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("warning: failed to decode {label}: {e}");
            None
        }
    }
}

fn main() {
    let args = Args::parse();

    let store = match SledStore::open(&args.data_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to open {}: {e}", args.data_dir.display());
            std::process::exit(1);
        }
    };

    println!("platformvm data dir: {}", args.data_dir.display());
    println!();

    match store.get(keys::LAST_ACCEPTED) {
        Ok(Some(bytes)) => {
            if let Some(id) = decode_or_warn::<Id>("lastAccepted", &bytes) {
                println!("last accepted block: {id}");
            }
        }
        Ok(None) => println!("last accepted block: <none, uninitialized>"),
        Err(e) => eprintln!("warning: failed to read lastAccepted: {e}"),
    }

    match store.get(keys::TIMESTAMP) {
        Ok(Some(bytes)) => {
            if let Some(ts) = decode_or_warn::<i64>("timestamp", &bytes) {
                println!("chain time: {ts}");
            }
        }
        Ok(None) => println!("chain time: 0"),
        Err(e) => eprintln!("warning: failed to read timestamp: {e}"),
    }

    match store.get(keys::FEE_POOL) {
        Ok(Some(bytes)) => {
            if let Some(pool) = decode_or_warn::<u64>("feePool", &bytes) {
                println!("fee pool: {pool}");
            }
        }
        Ok(None) => println!("fee pool: 0"),
        Err(e) => eprintln!("warning: failed to read feePool: {e}"),
    }

    let height = match store.scan_prefix(&keys::block_by_height_prefix()) {
        Ok(entries) => entries.len() as u64,
        Err(e) => {
            eprintln!("warning: failed to scan blockByHeight/: {e}");
            0
        }
    };
    println!("accepted height: {height}");
    println!();

    dump_stakers(&store, "current", &keys::current_staker_prefix(), args.verbose);
    dump_stakers(&store, "pending", &keys::pending_staker_prefix(), args.verbose);
    dump_supernets(&store, args.verbose);
    dump_chains(&store, args.verbose);
    dump_reward_pools(&store);
    dump_current_supply(&store);
}

fn dump_stakers(store: &SledStore, label: &str, prefix: &[u8], verbose: bool) {
    let entries = match store.scan_prefix(prefix) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to scan {label} stakers: {e}");
            return;
        }
    };
    println!("{label} stakers: {}", entries.len());
    if verbose {
        for (_, value) in &entries {
            if let Some(staker) = decode_or_warn::<Staker>(&format!("{label} staker"), value) {
                println!(
                    "  node={} supernet={} weight={} [{}, {}) priority={:?}",
                    staker.node_id,
                    staker.supernet_id,
                    staker.weight,
                    staker.start_time,
                    staker.end_time,
                    staker.priority
                );
            }
        }
    }
    println!();
}

fn dump_supernets(store: &SledStore, verbose: bool) {
    let entries = match store.scan_prefix(&keys::supernet_prefix()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to scan supernets: {e}");
            return;
        }
    };
    println!("supernets: {}", entries.len());
    if verbose {
        for (_, value) in &entries {
            if let Some(supernet) = decode_or_warn::<Supernet>("supernet", value) {
                println!(
                    "  id={} transformed={}",
                    supernet.supernet_id,
                    supernet.is_transformed()
                );
            }
        }
    }
    println!();
}

fn dump_chains(store: &SledStore, verbose: bool) {
    let entries = match store.scan_prefix(&keys::chain_prefix()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to scan chains: {e}");
            return;
        }
    };
    println!("chains: {}", entries.len());
    if verbose {
        for (_, value) in &entries {
            if let Some(chain) = decode_or_warn::<ChainRecord>("chain", value) {
                println!(
                    "  id={} supernet={} name={}",
                    chain.chain_id, chain.supernet_id, chain.chain_name
                );
            }
        }
    }
    println!();
}

fn dump_reward_pools(store: &SledStore) {
    let entries = match store.scan_prefix(&keys::reward_pool_prefix()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to scan reward pools: {e}");
            return;
        }
    };
    println!("reward pools: {}", entries.len());
    for (key, value) in &entries {
        let supernet_id = Id::from_bytes(key[key.len() - 32..].try_into().unwrap());
        if let Some(remaining) = decode_or_warn::<u64>("rewardPool", value) {
            println!("  supernet={supernet_id} remaining={remaining}");
        }
    }
    println!();
}

fn dump_current_supply(store: &SledStore) {
    let entries = match store.scan_prefix(&keys::current_supply_prefix()) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("warning: failed to scan current supply: {e}");
            return;
        }
    };
    println!("current supply: {}", entries.len());
    for (key, value) in &entries {
        let supernet_id = Id::from_bytes(key[key.len() - 32..].try_into().unwrap());
        if let Some(supply) = decode_or_warn::<u64>("currentSupply", value) {
            println!("  supernet={supernet_id} supply={supply}");
        }
    }
}

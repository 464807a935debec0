//! Genesis bootstrap tool.
//!
//! Reads a JSON genesis template (primary-network validators, the fee pool
//! seed, and the primary network's owner key) and writes the equivalent
//! `sled` database directly through the same key layout
//! (`platformvm::state::keys`) that `StateStore::open` reads back, the way
//! the teacher's genesis loader seeds a fresh `blockchain_storage` tree
//! from `genesis.<network>.json` before the node ever runs consensus.
//!
//! This tool never goes through `PlatformVm`/`BlockExecutor` — there is no
//! parent block to verify a genesis validator set against — it writes the
//! accepted view directly, the same shortcut `migrate_db` takes when it
//! rewrites keys in an existing tree without replaying the chain.

use std::path::PathBuf;

use clap::Parser;
use ed25519_dalek::VerifyingKey;
use platformvm::ids::{Id, NodeId, PRIMARY_NETWORK_ID};
use platformvm::staker::{Priority, Staker};
use platformvm::state::keys;
use platformvm::state::{PersistentStore, WriteBatch};
use platformvm::supernet::{OwnerSpec, Supernet};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "pvm-genesis")]
#[command(about = "Seed a fresh platformvm data directory from a genesis template")]
struct Args {
    /// Path to a genesis template JSON file. See `GenesisTemplate` for the
    /// expected shape.
    #[arg(long)]
    template: PathBuf,

    /// Directory to create the sled database in. Must not already exist.
    #[arg(long)]
    data_dir: PathBuf,
}

/// On-disk genesis template. Keys are hex-encoded fixed-width byte
/// strings; `verifying_key_hex` is the 32-byte ed25519 public key the rest
/// of the crate stands in for a BLS key with.
#[derive(Debug, Deserialize)]
struct GenesisTemplate {
    chain_time: i64,
    fee_pool: u64,
    owner_verifying_key_hex: String,
    validators: Vec<GenesisValidator>,
}

#[derive(Debug, Deserialize)]
struct GenesisValidator {
    node_id_hex: String,
    verifying_key_hex: String,
    weight: u64,
    start_time: i64,
    end_time: i64,
}

fn decode_node_id(hex_str: &str) -> Result<NodeId, String> {
    let bytes = hex::decode(hex_str).map_err(|e| format!("bad node_id hex: {e}"))?;
    let arr: [u8; 20] = bytes
        .try_into()
        .map_err(|_| "node_id must be 20 bytes".to_string())?;
    Ok(NodeId::from_bytes(arr))
}

fn decode_verifying_key(hex_str: &str) -> Result<VerifyingKey, String> {
    let bytes = hex::decode(hex_str).map_err(|e| format!("bad key hex: {e}"))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "verifying key must be 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&arr).map_err(|e| format!("invalid verifying key: {e}"))
}

fn main() {
    let args = Args::parse();

    if args.data_dir.exists() {
        eprintln!(
            "refusing to overwrite existing data directory: {}",
            args.data_dir.display()
        );
        std::process::exit(1);
    }

    let text = match std::fs::read_to_string(&args.template) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to read genesis template: {e}");
            std::process::exit(1);
        }
    };
    let template: GenesisTemplate = match serde_json::from_str(&text) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("failed to parse genesis template: {e}");
            std::process::exit(1);
        }
    };

    let owner_key = match decode_verifying_key(&template.owner_verifying_key_hex) {
        Ok(k) => k,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    println!("creating sled database at {}", args.data_dir.display());
    let store = match platformvm::state::sled_store::SledStore::open(&args.data_dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to create sled store: {e}");
            std::process::exit(1);
        }
    };

    let mut batch = WriteBatch::new();

    let primary = Supernet::primary_network(OwnerSpec::single(owner_key));
    let encoded = platformvm::codec::encode(&primary).expect("encode primary network supernet");
    batch.put(keys::supernet(&PRIMARY_NETWORK_ID), encoded);

    let mut seeded = 0usize;
    for validator in &template.validators {
        let node_id = match decode_node_id(&validator.node_id_hex) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("skipping validator: {e}");
                continue;
            }
        };
        let public_key = match decode_verifying_key(&validator.verifying_key_hex) {
            Ok(k) => k,
            Err(e) => {
                eprintln!("skipping validator {}: {e}", validator.node_id_hex);
                continue;
            }
        };
        let tx_id = Id::from_canonical_bytes(
            format!("genesis-validator-{}", validator.node_id_hex).as_bytes(),
        );
        let staker = Staker {
            tx_id,
            node_id,
            supernet_id: PRIMARY_NETWORK_ID,
            weight: validator.weight,
            start_time: validator.start_time,
            end_time: validator.end_time,
            potential_reward: 0,
            priority: Priority::PrimaryValidatorCurrent,
            public_key: Some(public_key),
            delegation_fee_ppm: 0,
            reward_owner: Some(OwnerSpec::single(public_key)),
        };
        let encoded = platformvm::codec::encode(&staker).expect("encode genesis staker");
        batch.put(
            keys::current_staker(&PRIMARY_NETWORK_ID, &node_id),
            encoded,
        );
        seeded += 1;
        println!(
            "seeded validator {} weight={} [{}, {})",
            validator.node_id_hex, validator.weight, validator.start_time, validator.end_time
        );
    }

    batch.put(
        keys::LAST_ACCEPTED.to_vec(),
        platformvm::codec::encode(&PRIMARY_NETWORK_ID).expect("encode genesis block id"),
    );
    batch.put(
        keys::TIMESTAMP.to_vec(),
        platformvm::codec::encode(&template.chain_time).expect("encode genesis timestamp"),
    );
    batch.put(
        keys::FEE_POOL.to_vec(),
        platformvm::codec::encode(&template.fee_pool).expect("encode genesis fee pool"),
    );

    if let Err(e) = store.write_batch(batch) {
        eprintln!("failed to write genesis batch: {e}");
        std::process::exit(1);
    }

    println!();
    println!("genesis complete:");
    println!("  chain_time: {}", template.chain_time);
    println!("  fee_pool: {}", template.fee_pool);
    println!("  validators seeded: {}", seeded);
}

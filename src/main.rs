pub mod atomic_memory;
pub mod block;
pub mod chain_record;
pub mod codec;
pub mod config;
pub mod error;
pub mod ids;
pub mod mempool;
pub mod reward;
pub mod shutdown;
pub mod staker;
pub mod state;
pub mod supernet;
pub mod tx;
pub mod uptime;
pub mod utxo;
pub mod validator_set;
pub mod vm;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use atomic_memory::InMemorySharedMemory;
use config::VmConfig;
use shutdown::ShutdownManager;
use state::memory_store::MemoryStore;
use state::sled_store::SledStore;
use state::PersistentStore;
use uptime::InMemoryUptimeCalculator;
use vm::PlatformVm;

#[derive(Parser, Debug)]
#[command(name = "platformvm")]
#[command(about = "Platform-chain virtual machine daemon", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Use an in-memory store instead of sled, for local experimentation.
    #[arg(long)]
    memory: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_config {
        let cfg = VmConfig::testnet();
        match cfg.save_to_file(&args.config) {
            Ok(()) => {
                println!("generated default config at {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("failed to generate config: {e}");
                std::process::exit(1);
            }
        }
    }

    let cfg = match VmConfig::load_from_file(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load config ({e}), falling back to testnet defaults");
            VmConfig::testnet()
        }
    };

    config::init_tracing(&cfg.logging);

    let mut shutdown_manager = ShutdownManager::new();
    let shutdown_token = shutdown_manager.token();

    let base: Arc<dyn PersistentStore> = if args.memory {
        tracing::info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        if let Err(e) = std::fs::create_dir_all(&cfg.storage.data_dir) {
            tracing::warn!("failed to create data directory: {e}");
        }
        match SledStore::open(&cfg.storage.data_dir) {
            Ok(store) => {
                tracing::info!(dir = %cfg.storage.data_dir.display(), "opened sled store");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!("sled open failed ({e}), falling back to in-memory store");
                Arc::new(MemoryStore::new())
            }
        }
    };

    let shared_memory = InMemorySharedMemory::new();
    let uptime = Arc::new(InMemoryUptimeCalculator::new());

    let vm = match PlatformVm::initialize(base, shared_memory, uptime, cfg).await {
        Ok(vm) => Arc::new(vm),
        Err(e) => {
            eprintln!("failed to initialize VM: {e}");
            std::process::exit(1);
        }
    };

    let pruning_task = vm.spawn_pruning_task(shutdown_token.clone(), Duration::from_secs(60), 256);
    shutdown_manager.register_task(pruning_task);

    tracing::info!("platformvm daemon ready");
    shutdown_manager.wait_for_shutdown().await;
}

#[cfg(test)]
mod tests {
    #[test]
    fn args_parse_with_defaults() {
        use super::Args;
        use clap::Parser;
        let args = Args::parse_from(["platformvm"]);
        assert_eq!(args.config, "config.toml");
        assert!(!args.memory);
    }
}

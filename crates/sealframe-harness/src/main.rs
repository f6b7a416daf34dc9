//! Sealframe vault simulation binary.
//!
//! Runs the lock → unlock → release lifecycle across a threaded in-process
//! cluster and logs what every node observes.
//!
//! # Usage
//!
//! ```bash
//! # Three nodes, OS randomness
//! sealframe-sim --nodes 3 --payload hello
//!
//! # Reproducible keys and ids
//! sealframe-sim --seed 42 --log-level debug
//! ```

use std::time::Duration;

use clap::Parser;
use sealframe_core::{Environment, SystemEnv, VaultConfig, VaultError};
use sealframe_harness::{SimEnv, ThreadedCluster};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sealframe commit-then-reveal simulation
#[derive(Parser, Debug)]
#[command(name = "sealframe-sim")]
#[command(about = "Simulate commit-then-reveal vaults across an in-process peer group")]
#[command(version)]
struct Args {
    /// Number of nodes in the peer group
    #[arg(short, long, default_value = "3")]
    nodes: usize,

    /// Data locked by the first node
    #[arg(short, long, default_value = "hello")]
    payload: String,

    /// Per-wait timeout in milliseconds
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    /// Seed for deterministic randomness (OS RNG if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if args.nodes < 2 {
        return Err("at least two nodes are required".into());
    }
    if args.timeout_ms == 0 {
        return Err("timeout must be positive".into());
    }

    tracing::info!(nodes = args.nodes, seed = ?args.seed, "Sealframe simulation starting");

    match args.seed {
        Some(seed) => run(&args, &SimEnv::with_seed(seed))?,
        None => run(&args, &SystemEnv::new())?,
    }

    tracing::info!("Simulation finished");
    Ok(())
}

fn run<E: Environment>(args: &Args, env: &E) -> Result<(), VaultError> {
    let timeout = Duration::from_millis(args.timeout_ms);
    let mut cluster = ThreadedCluster::start(args.nodes, env, &VaultConfig::default())?;
    let creator = cluster.node(0);

    let vault_id = creator.lock(args.payload.as_bytes())?;
    tracing::info!(vault_id = %vault_id, node = %creator.node_id(), "Locked");

    for peer in &cluster.nodes()[1..] {
        let known = peer.wait_until_known(&vault_id, timeout)?;
        let readable = peer.get(&vault_id);
        tracing::info!(
            node = %peer.node_id(),
            known,
            sealed = matches!(readable, Err(VaultError::NotUnlocked { .. })),
            "Before unlock"
        );
    }

    creator.unlock(&vault_id)?;
    tracing::info!(vault_id = %vault_id, "Key revealed");

    for peer in &cluster.nodes()[1..] {
        let unlocked = peer.wait_until_unlocked(&vault_id, timeout)?;
        match peer.get(&vault_id) {
            Ok(bytes) => tracing::info!(
                node = %peer.node_id(),
                unlocked,
                plaintext = %String::from_utf8_lossy(&bytes),
                "After unlock"
            ),
            Err(e) => {
                tracing::warn!(node = %peer.node_id(), error = %e, "Not readable after unlock");
            },
        }
    }

    creator.release(&vault_id)?;
    for node in cluster.nodes() {
        let forgotten = node.wait_until_forgotten(&vault_id, timeout)?;
        tracing::info!(node = %node.node_id(), forgotten, "After release");
    }

    for failure in cluster.errors() {
        tracing::warn!(node = %failure.node, error = %failure.error, "Node reported an error");
    }

    cluster.shutdown();
    Ok(())
}

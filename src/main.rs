/*!
 * raft-demo - single-node demo driver for `raft_core::RaftCore`.
 *
 * Loads a `NodeConfig` (TOML, with environment overrides), constructs a
 * replica over an in-memory `MemStorage`, and drives it on a fixed tick
 * interval, logging every role transition and committed index. It does not
 * talk to any peers over a network — see `raft-cluster-demo` for a
 * multi-node run over an in-process transport.
 */

use std::path::PathBuf;
use std::time::Duration;

use raft_core::{MemStorage, NodeConfig, RaftCore, SoftState};

#[derive(Debug)]
enum Command {
    /// Run a single node against an in-memory store, ticking forever.
    Start { config: Option<PathBuf> },
    /// Write a default three-node configuration to a path.
    ConfigGenerate { node_id: u64, output: PathBuf },
    /// Parse a configuration file and print it back out.
    ConfigShow { config: PathBuf },
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("start") => Command::Start { config: args.get(2).map(PathBuf::from) },
        Some("config-generate") => Command::ConfigGenerate {
            node_id: args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1),
            output: args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("node.toml")),
        },
        Some("config-show") => Command::ConfigShow {
            config: args.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("node.toml")),
        },
        _ => {
            eprintln!("usage: raft-demo <start [config.toml]|config-generate <id> <out>|config-show <config.toml>>");
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    match parse_args() {
        Command::Start { config } => run_node(config).await,
        Command::ConfigGenerate { node_id, output } => {
            let config = NodeConfig::default_for_node(node_id);
            if let Err(e) = config.save(&output) {
                log::error!("failed to write {}: {}", output.display(), e);
                std::process::exit(1);
            }
            log::info!("wrote default config for node {} to {}", node_id, output.display());
        }
        Command::ConfigShow { config } => match NodeConfig::load(&config) {
            Ok(cfg) => println!("{:#?}", cfg),
            Err(e) => {
                log::error!("failed to load {}: {}", config.display(), e);
                std::process::exit(1);
            }
        },
    }
}

async fn run_node(config_path: Option<PathBuf>) {
    let mut node_config = match config_path {
        Some(path) => match NodeConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => NodeConfig::default_for_node(1),
    };
    node_config.apply_env_overrides();

    let raft_config = node_config.to_raft_config();
    let id = raft_config.id;
    let storage = MemStorage::default();
    let mut core = match RaftCore::new(raft_config, storage.clone()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("failed to construct raft core: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("node {} starting, peers: {:?}", id, node_config.cluster.peers);

    let mut last_soft_state: Option<SoftState> = None;
    let mut last_committed = 0u64;
    let mut ticker = tokio::time::interval(Duration::from_millis(100));

    loop {
        ticker.tick().await;
        core.tick();

        // Persist newly generated hard state and unstable entries before
        // dispatching anything that depends on them (spec §4.1).
        let pending = core.unstable_entries().to_vec();
        if !pending.is_empty() {
            let last = pending.last().unwrap().index;
            if let Err(e) = storage.append(&pending) {
                log::error!("{} failed to persist log entries: {}", id, e);
            } else {
                core.mark_stable(last);
            }
        }
        storage.set_hard_state(core.hard_state());

        for m in core.take_messages() {
            // No peer wiring in this single-node demo; outbound messages to
            // other nodes are simply logged.
            log::debug!("{} -> {}: {:?} (term {})", m.from, m.to, m.msg_type, m.term);
        }

        let soft_state = core.soft_state();
        if last_soft_state != Some(soft_state) {
            log::info!("{} role -> {:?} (leader: {})", id, soft_state.role, soft_state.leader_id);
            last_soft_state = Some(soft_state);
        }
        if core.committed() != last_committed {
            log::info!("{} committed -> {}", id, core.committed());
            last_committed = core.committed();
        }
    }
}

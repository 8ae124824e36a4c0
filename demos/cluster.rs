/*!
 * raft-cluster-demo - a 3-node cluster wired together by `ChannelTransport`
 * in a single process. Demonstrates election, log replication via
 * `propose`, and the commit index converging across all three replicas.
 */

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use raft_core::{ChannelTransport, MemStorage, RaftConfig, RaftCore, Transport};

const NODES: [u64; 3] = [1, 2, 3];
const TICK: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() {
    env_logger::init();

    let transport = ChannelTransport::new(&NODES);
    let stores: Vec<MemStorage> = NODES.iter().map(|_| MemStorage::default()).collect();
    let nodes: Vec<Arc<Mutex<RaftCore<MemStorage>>>> = NODES
        .iter()
        .zip(stores.iter())
        .map(|(&id, store)| {
            let config = RaftConfig { id, heartbeat_tick: 1, election_tick: 10, applied: 0, peers: NODES.to_vec() };
            Arc::new(Mutex::new(RaftCore::new(config, store.clone()).expect("valid config")))
        })
        .collect();

    let mut handles = Vec::new();
    for (idx, &id) in NODES.iter().enumerate() {
        let node = nodes[idx].clone();
        let store = stores[idx].clone();
        let transport = transport.clone();
        handles.push(tokio::spawn(async move {
            drive(id, node, store, transport).await;
        }));
    }

    // Let the cluster elect a leader, then submit a handful of proposals
    // through whichever replica currently believes itself leader.
    tokio::time::sleep(Duration::from_millis(500)).await;
    for i in 0..5u32 {
        for node in &nodes {
            let mut core = node.lock();
            if core.is_leader() {
                let _ = core.propose(vec![format!("entry-{}", i).into_bytes()]);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    for node in &nodes {
        let core = node.lock();
        log::info!("node {} committed={} role={:?}", core.id, core.committed(), core.role());
    }

    for h in handles {
        h.abort();
    }
}

async fn drive(id: u64, node: Arc<Mutex<RaftCore<MemStorage>>>, store: MemStorage, transport: ChannelTransport) {
    let mut ticker = tokio::time::interval(TICK);
    loop {
        ticker.tick().await;

        while let Some(m) = transport.recv(id) {
            let mut core = node.lock();
            if let Err(e) = core.step(m) {
                log::warn!("node {} rejected message: {}", id, e);
            }
        }

        let outbound = {
            let mut core = node.lock();
            core.tick();

            let pending = core.unstable_entries().to_vec();
            if !pending.is_empty() {
                let last = pending.last().unwrap().index;
                if store.append(&pending).is_ok() {
                    core.mark_stable(last);
                }
            }
            store.set_hard_state(core.hard_state());

            core.take_messages()
        };
        for m in outbound {
            transport.send(m);
        }
    }
}

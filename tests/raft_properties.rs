//! Property-based tests for the quantified invariants: term monotonicity,
//! election safety, single vote per term, log monotonicity, leader
//! completeness at commit, and the match/next progress invariant.

use std::collections::HashMap;

use proptest::prelude::*;

use raft_core::{FixedTimeout, MemStorage, Message, MessageType, RaftConfig, RaftCore};

#[derive(Debug, Clone, Copy)]
enum Event {
    Tick(usize),
    Propose(usize, Vec<u8>),
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0usize..3).prop_map(Event::Tick),
        (0usize..3, any::<u8>()).prop_map(|(n, b)| Event::Propose(n, vec![b])),
    ]
}

const IDS: [u64; 3] = [1, 2, 3];

fn build_cluster(seeds: &[u64; 3]) -> Vec<RaftCore<MemStorage>> {
    IDS.iter()
        .zip(seeds.iter())
        .map(|(&id, &seed)| {
            let config = RaftConfig { id, heartbeat_tick: 1, election_tick: 8, applied: 0, peers: IDS.to_vec() };
            RaftCore::new(config, MemStorage::default())
                .unwrap()
                .with_rng(Box::new(FixedTimeout::new(vec![seed % 8])))
        })
        .collect()
}

/// `(node_id, term, vote)` sampled after every event, used to check that a
/// cast vote never silently changes within the same term (spec §8.3).
type VoteTrace = Vec<(u64, u64, u64)>;

fn run(nodes: &mut [RaftCore<MemStorage>], events: &[Event]) -> VoteTrace {
    let mut inboxes: HashMap<u64, Vec<Message>> = HashMap::new();
    let mut trace = VoteTrace::new();

    let mut step_round = |nodes: &mut [RaftCore<MemStorage>], inboxes: &mut HashMap<u64, Vec<Message>>| {
        for n in nodes.iter_mut() {
            for m in n.take_messages() {
                inboxes.entry(m.to).or_default().push(m);
            }
        }
        for (idx, id) in IDS.iter().enumerate() {
            if let Some(queue) = inboxes.get_mut(id) {
                for m in queue.drain(..) {
                    let _ = nodes[idx].step(m);
                }
            }
        }
    };

    for ev in events {
        match *ev {
            Event::Tick(n) => {
                let idx = n % nodes.len();
                nodes[idx].tick();
            }
            Event::Propose(n, ref data) => {
                let idx = n % nodes.len();
                if nodes[idx].is_leader() {
                    let _ = nodes[idx].propose(vec![data.clone()]);
                }
            }
        }

        step_round(nodes, &mut inboxes);
        for n in nodes.iter() {
            trace.push((n.id, n.term, n.vote));
        }
    }

    // Drain once more so the last round's responses land before assertions.
    step_round(nodes, &mut inboxes);
    trace
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn at_most_one_leader_per_term(
        seeds in [0u64..8, 0u64..8, 0u64..8],
        events in prop::collection::vec(event_strategy(), 1..60),
    ) {
        let mut nodes = build_cluster(&seeds);
        let _ = run(&mut nodes, &events);

        let mut leaders_by_term: HashMap<u64, usize> = HashMap::new();
        for n in &nodes {
            if n.is_leader() {
                *leaders_by_term.entry(n.term).or_insert(0) += 1;
            }
        }
        for (_, count) in leaders_by_term {
            prop_assert!(count <= 1);
        }
    }

    #[test]
    fn log_indices_stay_ordered(
        seeds in [0u64..8, 0u64..8, 0u64..8],
        events in prop::collection::vec(event_strategy(), 1..60),
    ) {
        let mut nodes = build_cluster(&seeds);
        let _ = run(&mut nodes, &events);

        for n in &nodes {
            let log = n.raft_log();
            prop_assert!(log.committed <= n.last_index());
            prop_assert!(log.applied <= log.committed);
            prop_assert!(log.stabled <= n.last_index());
        }
    }

    #[test]
    fn leader_only_commits_current_term_entries(
        seeds in [0u64..8, 0u64..8, 0u64..8],
        events in prop::collection::vec(event_strategy(), 1..60),
    ) {
        let mut nodes = build_cluster(&seeds);
        let _ = run(&mut nodes, &events);

        for n in &nodes {
            if n.is_leader() && n.committed() > 0 {
                prop_assert_eq!(n.raft_log().term(n.committed()), n.term);
            }
        }
    }

    #[test]
    fn term_never_decreases_and_vote_is_stable_within_a_term(
        seeds in [0u64..8, 0u64..8, 0u64..8],
        events in prop::collection::vec(event_strategy(), 1..60),
    ) {
        let mut nodes = build_cluster(&seeds);
        let trace = run(&mut nodes, &events);

        let mut last_term: HashMap<u64, u64> = HashMap::new();
        let mut vote_at_term: HashMap<(u64, u64), u64> = HashMap::new();
        for (id, term, vote) in trace {
            let prev = *last_term.get(&id).unwrap_or(&0);
            prop_assert!(term >= prev, "node {} term regressed from {} to {}", id, prev, term);
            last_term.insert(id, term);

            if vote != raft_core::NONE {
                match vote_at_term.get(&(id, term)) {
                    Some(&recorded) => prop_assert_eq!(recorded, vote),
                    None => {
                        vote_at_term.insert((id, term), vote);
                    }
                }
            }
        }
    }

    #[test]
    fn match_always_stays_below_next(
        seeds in [0u64..8, 0u64..8, 0u64..8],
        events in prop::collection::vec(event_strategy(), 1..60),
    ) {
        let mut nodes = build_cluster(&seeds);
        let _ = run(&mut nodes, &events);

        for n in &nodes {
            if let Some(progress) = n.progress() {
                for p in progress.values() {
                    prop_assert!(p.matched < p.next_index);
                }
            }
        }
    }
}

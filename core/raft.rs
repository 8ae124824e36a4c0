/*!
 * The role state machine: construction, tick-driven timers, the step
 * dispatcher, and the election/replication/heartbeat/propose handlers
 * (spec §4). This is the algorithmic heart of the crate — pure,
 * single-threaded, and driven entirely by `tick()`/`step()` calls from an
 * external driver.
 */

use std::collections::HashMap;

use crate::config::RaftConfig;
use crate::error::{Error, Result};
use crate::message::{Message, MessageType};
use crate::progress::{Progress, ProgressSet};
use crate::raft_log::RaftLog;
use crate::rand_source::{RandomTimeout, ThreadRngTimeout};
use crate::storage::Storage;
use crate::types::{HardState, LogEntry, NodeId, RoleTag, SoftState, Term, NONE};

/// The role a replica is playing, carrying only the data meaningful to
/// that role (spec §9: "make illegal accesses unrepresentable").
enum RoleState {
    Follower,
    Candidate { votes: HashMap<NodeId, bool> },
    Leader { progress: ProgressSet },
}

impl RoleState {
    fn tag(&self) -> RoleTag {
        match self {
            RoleState::Follower => RoleTag::Follower,
            RoleState::Candidate { .. } => RoleTag::Candidate,
            RoleState::Leader { .. } => RoleTag::Leader,
        }
    }
}

/// A stub configuration-change request. Cluster membership changes are out
/// of scope for this crate (spec §1); this type and
/// [`RaftCore::propose_conf_change`] exist so the shape is visible without
/// being implemented.
#[derive(Debug, Clone, Copy)]
pub struct ConfChange {
    pub node_id: NodeId,
}

/// A single Raft replica: the per-node role state machine described by
/// spec §2–§4.
pub struct RaftCore<S> {
    pub id: NodeId,
    pub term: Term,
    pub vote: NodeId,
    pub lead: NodeId,

    role: RoleState,
    peers: Vec<NodeId>,
    raft_log: RaftLog<S>,

    election_elapsed: u64,
    heartbeat_elapsed: u64,
    election_timeout: u64,
    heartbeat_timeout: u64,
    randomized_election_timeout: u64,
    rng: Box<dyn RandomTimeout>,

    /// Index at or above which a pending configuration change sits; stub
    /// per spec §1/§3 (membership changes are not implemented).
    pending_conf_index: u64,

    msgs: Vec<Message>,
}

impl<S: Storage> RaftCore<S> {
    /// Construct a replica from a validated configuration and a storage
    /// collaborator (spec §4.1).
    pub fn new(config: RaftConfig, storage: S) -> Result<Self> {
        config.validate()?;

        let initial = storage.initial_state()?;
        let raft_log = RaftLog::new(storage, initial.hard_state.commit, config.applied)?;

        let mut peers = if !initial.conf_state.nodes.is_empty() {
            initial.conf_state.nodes.clone()
        } else {
            config.peers.clone()
        };
        if !peers.contains(&config.id) {
            peers.push(config.id);
        }

        let mut core = RaftCore {
            id: config.id,
            term: initial.hard_state.term,
            vote: initial.hard_state.vote,
            lead: NONE,
            role: RoleState::Follower,
            peers,
            raft_log,
            election_elapsed: 0,
            heartbeat_elapsed: 0,
            election_timeout: config.election_tick,
            heartbeat_timeout: config.heartbeat_tick,
            randomized_election_timeout: config.election_tick,
            rng: Box::new(ThreadRngTimeout),
            pending_conf_index: 0,
            msgs: Vec::new(),
        };
        core.reset_randomized_election_timeout();
        log::info!("raft {} initialized at term {} with peers {:?}", core.id, core.term, core.peers);
        Ok(core)
    }

    /// Override the randomized-timeout source (spec §9: inject randomness
    /// as a collaborator so tests can pin it).
    pub fn with_rng(mut self, rng: Box<dyn RandomTimeout>) -> Self {
        self.rng = rng;
        self.reset_randomized_election_timeout();
        self
    }

    // ---- status accessors (spec §6) -----------------------------------

    pub fn soft_state(&self) -> SoftState {
        SoftState {
            leader_id: self.lead,
            role: self.role.tag(),
        }
    }

    pub fn hard_state(&self) -> HardState {
        HardState {
            term: self.term,
            vote: self.vote,
            commit: self.raft_log.committed,
        }
    }

    pub fn role(&self) -> RoleTag {
        self.role.tag()
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.role, RoleState::Leader { .. })
    }

    pub fn last_index(&self) -> u64 {
        self.raft_log.last_index()
    }

    pub fn committed(&self) -> u64 {
        self.raft_log.committed
    }

    pub fn raft_log(&self) -> &RaftLog<S> {
        &self.raft_log
    }

    /// The per-peer replication progress table, if this replica currently
    /// believes itself leader. `None` in any other role.
    pub fn progress(&self) -> Option<&ProgressSet> {
        match &self.role {
            RoleState::Leader { progress } => Some(progress),
            _ => None,
        }
    }

    /// Drain the outbound message buffer (spec §6: "outbound drain").
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.msgs)
    }

    /// Entries not yet known to be durable. Per spec §4.1, a driver must
    /// persist these (and the current [`RaftCore::hard_state`]) before
    /// dispatching any outbound messages that depend on them, then report
    /// back via [`RaftCore::mark_stable`].
    pub fn unstable_entries(&self) -> &[LogEntry] {
        self.raft_log.unstable_entries()
    }

    /// Record that entries up to and including `index` are now durable in
    /// the storage collaborator.
    pub fn mark_stable(&mut self, index: u64) {
        self.raft_log.mark_stable(index);
    }

    fn quorum(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    fn reset_randomized_election_timeout(&mut self) {
        self.randomized_election_timeout =
            self.election_timeout + self.rng.gen_range(0, self.election_timeout);
    }

    // ---- tick driver (spec §4.3) ---------------------------------------

    /// Advance the logical clock by one tick.
    pub fn tick(&mut self) {
        let is_leader = matches!(self.role, RoleState::Leader { .. });
        if is_leader {
            self.heartbeat_elapsed += 1;
            if self.heartbeat_elapsed >= self.heartbeat_timeout {
                self.heartbeat_elapsed = 0;
                let _ = self.step(Message::new(MessageType::Beat, self.id, self.id, 0));
            }
        } else {
            self.election_elapsed += 1;
            if self.election_elapsed >= self.randomized_election_timeout {
                self.election_elapsed = 0;
                let _ = self.step(Message::new(MessageType::Hup, self.id, self.id, 0));
            }
        }
    }

    // ---- role transitions (spec §4.2) ----------------------------------

    /// Step down to Follower. Only clears the current vote when `term` is
    /// actually advancing — stepping down within the same term (e.g. a
    /// Candidate recognizing a same-term leader's Heartbeat/Append) must
    /// not erase the vote record, or the single-vote-per-term invariant
    /// (spec §8.3) would break. See DESIGN.md.
    fn become_follower(&mut self, term: Term, lead: NodeId) {
        if term != self.term {
            self.vote = NONE;
        }
        self.role = RoleState::Follower;
        self.term = term;
        self.lead = lead;
        log::debug!("{} became follower at term {} (lead={})", self.id, term, lead);
    }

    fn become_candidate(&mut self) {
        self.term += 1;
        self.vote = self.id;
        self.lead = NONE;
        let mut votes = HashMap::new();
        votes.insert(self.id, true);
        self.role = RoleState::Candidate { votes };
        self.election_elapsed = 0;
        self.reset_randomized_election_timeout();
        log::info!("{} became candidate at term {}", self.id, self.term);
    }

    fn become_leader(&mut self) {
        let last_index = self.raft_log.last_index();
        let mut progress = ProgressSet::new();
        for &p in &self.peers {
            if p == self.id {
                progress.insert(p, Progress { matched: last_index + 1, next_index: last_index + 2 });
            } else {
                progress.insert(p, Progress::new(last_index + 1));
            }
        }
        self.role = RoleState::Leader { progress };
        self.lead = self.id;
        self.heartbeat_elapsed = 0;

        let noop = LogEntry { term: self.term, index: last_index + 1, data: Vec::new() };
        self.raft_log.append(noop);
        log::info!("{} became leader at term {}", self.id, self.term);

        self.broadcast_append();
        if self.peers.len() == 1 {
            let li = self.raft_log.last_index();
            self.raft_log.commit_to(li);
        }
    }

    // ---- step dispatcher (spec §4.4) -----------------------------------

    /// Route an inbound (or internally injected) message to the handler
    /// appropriate for the current role.
    pub fn step(&mut self, m: Message) -> Result<()> {
        if !m.msg_type.is_internal() && m.term == 0 {
            return Err(Error::OutOfProtocol { msg_type: m.msg_type, from: m.from });
        }

        // Centralized higher-term step-down (spec §9), uniform across every
        // peer-originated message kind except RequestVoteResponse, which
        // carries its own documented term semantics (§4.5, Open Question iii).
        if !m.msg_type.is_internal() && m.msg_type != MessageType::RequestVoteResponse && m.term > self.term {
            self.become_follower(m.term, NONE);
        }

        match m.msg_type {
            MessageType::Hup => {
                if !matches!(self.role, RoleState::Leader { .. }) {
                    self.do_election();
                }
                Ok(())
            }
            MessageType::Beat => {
                if matches!(self.role, RoleState::Leader { .. }) {
                    self.broadcast_heartbeat();
                }
                Ok(())
            }
            MessageType::Propose => {
                let datas = m.entries.into_iter().map(|e| e.data).collect();
                self.propose(datas)
            }
            MessageType::RequestVote => {
                self.handle_request_vote(m);
                Ok(())
            }
            MessageType::RequestVoteResponse => {
                if matches!(self.role, RoleState::Candidate { .. }) {
                    self.handle_request_vote_response(m);
                }
                Ok(())
            }
            MessageType::Append => {
                self.handle_append(m);
                Ok(())
            }
            MessageType::AppendResponse => {
                if matches!(self.role, RoleState::Leader { .. }) {
                    self.handle_append_response(m);
                }
                Ok(())
            }
            MessageType::Heartbeat => {
                self.handle_heartbeat(m);
                Ok(())
            }
            MessageType::HeartbeatResponse => {
                if matches!(self.role, RoleState::Leader { .. }) {
                    self.send_append(m.from);
                }
                Ok(())
            }
            MessageType::Snapshot => Ok(()), // stub — out of scope.
        }
    }

    // ---- election (spec §4.5) ------------------------------------------

    fn do_election(&mut self) {
        self.become_candidate();
        if self.peers.len() == 1 {
            self.become_leader();
            return;
        }
        let last_index = self.raft_log.last_index();
        let last_term = self.raft_log.last_term();
        let term = self.term;
        for &p in self.peers.clone().iter() {
            if p == self.id {
                continue;
            }
            let mut m = Message::new(MessageType::RequestVote, self.id, p, term);
            m.index = last_index;
            m.log_term = last_term;
            self.msgs.push(m);
        }
    }

    fn handle_request_vote(&mut self, m: Message) {
        let term_reject =
            m.term < self.term || (m.term == self.term && self.vote != NONE && self.vote != m.from);

        if m.term > self.term {
            self.become_follower(m.term, NONE);
        }

        let reject = if term_reject {
            true
        } else {
            let last_term = self.raft_log.last_term();
            let last_index = self.raft_log.last_index();
            m.log_term < last_term || (m.log_term == last_term && m.index < last_index)
        };

        if !reject {
            self.reset_randomized_election_timeout();
            self.election_elapsed = 0;
            self.term = m.term;
            self.vote = m.from;
        }

        let mut resp = Message::new(MessageType::RequestVoteResponse, self.id, m.from, self.term);
        resp.reject = reject;
        self.msgs.push(resp);
    }

    fn handle_request_vote_response(&mut self, m: Message) {
        if m.term > self.term {
            self.become_follower(m.term, NONE);
            return;
        }
        if m.term < self.term {
            return; // stale
        }

        if let RoleState::Candidate { votes } = &mut self.role {
            votes.insert(m.from, !m.reject);
        }

        let quorum = self.quorum();
        let (granted, denied) = match &self.role {
            RoleState::Candidate { votes } => (
                votes.values().filter(|&&v| v).count(),
                votes.values().filter(|&&v| !v).count(),
            ),
            _ => return,
        };

        if granted >= quorum {
            self.become_leader();
        } else if denied >= quorum {
            // Open Question (iii), resolved: step down without clearing our
            // own vote — `response.term == self.term` here, so this is not
            // a real term bump. See DESIGN.md.
            self.role = RoleState::Follower;
            self.lead = NONE;
        }
    }

    // ---- log replication (spec §4.6) -----------------------------------

    fn broadcast_append(&mut self) {
        for p in self.peers.clone() {
            if p != self.id {
                self.send_append(p);
            }
        }
    }

    fn send_append(&mut self, to: NodeId) {
        let next = match &self.role {
            RoleState::Leader { progress } => progress.get(&to).map(|p| p.next_index),
            _ => return,
        };
        let next = match next {
            Some(n) => n,
            None => return,
        };

        let prev = next.saturating_sub(1);
        let prev_term = self.raft_log.term(prev);
        let last = self.raft_log.last_index();
        let entries = self.raft_log.slice(prev, last);

        let mut m = Message::new(MessageType::Append, self.id, to, self.term);
        m.index = prev;
        m.log_term = prev_term;
        m.entries = entries;
        m.commit = self.raft_log.committed;
        self.msgs.push(m);
    }

    fn handle_append(&mut self, m: Message) {
        if m.term < self.term {
            let mut resp = Message::new(MessageType::AppendResponse, self.id, m.from, self.term);
            resp.reject = true;
            self.msgs.push(resp);
            return;
        }

        self.become_follower(m.term, m.from);
        self.reset_randomized_election_timeout();
        self.election_elapsed = 0;

        let last_index = self.raft_log.last_index();
        if m.index > last_index {
            let mut resp = Message::new(MessageType::AppendResponse, self.id, m.from, self.term);
            resp.reject = true;
            resp.index = m.index;
            self.msgs.push(resp);
            return;
        }
        if self.raft_log.term(m.index) != m.log_term {
            let mut resp = Message::new(MessageType::AppendResponse, self.id, m.from, self.term);
            resp.reject = true;
            resp.index = m.index;
            self.msgs.push(resp);
            return;
        }

        let mut next_index = m.index;
        for entry in &m.entries {
            next_index += 1;
            if entry.index <= self.raft_log.last_index() {
                if self.raft_log.term(entry.index) == entry.term {
                    continue;
                }
                self.raft_log.truncate_and_append(entry.index, entry.clone());
                self.raft_log.mark_stable(m.index);
            } else {
                self.raft_log.append(entry.clone());
            }
        }
        debug_assert_eq!(next_index, m.index + m.entries.len() as u64);

        let last = self.raft_log.last_index();
        let new_commit = m.commit.min(m.index + m.entries.len() as u64).min(last);
        if new_commit > self.raft_log.committed {
            self.raft_log.commit_to(new_commit);
        }

        let mut resp = Message::new(MessageType::AppendResponse, self.id, m.from, self.term);
        resp.reject = false;
        resp.index = self.raft_log.last_index();
        self.msgs.push(resp);
    }

    fn handle_append_response(&mut self, m: Message) {
        let next = match &self.role {
            RoleState::Leader { progress } => progress.get(&m.from).map(|p| p.next_index),
            _ => return,
        };
        let next = match next {
            Some(n) => n,
            None => return,
        };

        if m.reject {
            if m.index == next.saturating_sub(1) {
                if let RoleState::Leader { progress } = &mut self.role {
                    if let Some(p) = progress.get_mut(&m.from) {
                        p.maybe_decrement(m.index);
                    }
                }
                self.send_append(m.from);
            }
            return;
        }

        if m.index < next || self.raft_log.term(m.index) != self.term {
            return; // stale
        }

        if let RoleState::Leader { progress } = &mut self.role {
            if let Some(p) = progress.get_mut(&m.from) {
                p.update(m.index);
            }
        }

        self.maybe_commit();
    }

    /// Scan candidate commit indices top-down; advance `committed` to the
    /// highest index replicated to a quorum whose term matches our own
    /// (the leader-completeness / commit restriction of spec §4.6).
    fn maybe_commit(&mut self) -> bool {
        let first = self.raft_log.first_index();
        let quorum = self.quorum();
        let progress = match &self.role {
            RoleState::Leader { progress } => progress.clone(),
            _ => return false,
        };

        let mut n = self.raft_log.last_index();
        while n > self.raft_log.committed && n >= first {
            if self.raft_log.term(n) != self.term {
                break; // everything below here is an older term too.
            }
            let count = 1 + progress
                .iter()
                .filter(|(&id, p)| id != self.id && p.matched >= n)
                .count();
            if count >= quorum {
                self.raft_log.commit_to(n);
                self.broadcast_append();
                return true;
            }
            if n == 0 {
                break;
            }
            n -= 1;
        }
        false
    }

    // ---- heartbeats (spec §4.7) -----------------------------------------

    fn broadcast_heartbeat(&mut self) {
        for p in self.peers.clone() {
            if p != self.id {
                let m = Message::new(MessageType::Heartbeat, self.id, p, self.term);
                self.msgs.push(m);
            }
        }
    }

    fn handle_heartbeat(&mut self, m: Message) {
        if m.term < self.term {
            let mut resp = Message::new(MessageType::HeartbeatResponse, self.id, m.from, self.term);
            resp.reject = true;
            self.msgs.push(resp);
            return;
        }
        self.become_follower(m.term, m.from);
        self.reset_randomized_election_timeout();
        self.election_elapsed = 0;
        self.msgs.push(Message::new(MessageType::HeartbeatResponse, self.id, m.from, self.term));
    }

    // ---- propose (spec §4.8) --------------------------------------------

    /// Submit client writes. Only accepted while leader.
    pub fn propose(&mut self, datas: Vec<Vec<u8>>) -> Result<()> {
        if !matches!(self.role, RoleState::Leader { .. }) {
            return Err(Error::ProposalDropped("not the leader"));
        }

        let mut last = self.raft_log.last_index();
        for data in datas {
            last += 1;
            self.raft_log.append(LogEntry { term: self.term, index: last, data });
        }

        let new_last = self.raft_log.last_index();
        if let RoleState::Leader { progress } = &mut self.role {
            if let Some(p) = progress.get_mut(&self.id) {
                p.update(new_last);
            }
        }

        if self.peers.len() == 1 {
            self.raft_log.commit_to(new_last);
        } else {
            self.broadcast_append();
        }
        Ok(())
    }

    // ---- membership / snapshot stubs (spec §1, out of scope) ------------

    pub fn propose_conf_change(&mut self, _cc: ConfChange) -> Result<()> {
        if self.raft_log.applied < self.pending_conf_index {
            return Err(Error::ProposalDropped("conf change pending past applied watermark"));
        }
        Err(Error::NotImplemented("configuration changes"))
    }

    pub fn request_snapshot(&mut self) -> Result<()> {
        Err(Error::NotImplemented("snapshot transfer"))
    }
}

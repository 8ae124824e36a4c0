/*!
 * Primitive data types shared by the log, the storage collaborator, and the
 * role state machine.
 */

use serde::{Deserialize, Serialize};

/// Non-zero unique identifier for a node in the cluster. The reserved value
/// `NONE` means "no such node / no vote cast / no known leader".
pub type NodeId = u64;

/// Monotonically non-decreasing epoch counter identifying a leadership
/// generation.
pub type Term = u64;

/// The reserved "no node" sentinel (spec §3).
pub const NONE: NodeId = 0;

/// A single entry in the replicated log. Indices are 1-origin, contiguous,
/// and strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: Term,
    pub index: u64,
    pub data: Vec<u8>,
}

/// Persistent state that must survive a restart: current term, the vote
/// cast in that term (if any), and the commit index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardState {
    pub term: Term,
    pub vote: NodeId,
    pub commit: u64,
}

/// The set of nodes in the cluster, as known to the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfState {
    pub nodes: Vec<NodeId>,
}

/// The tagged role a replica is currently playing, without the per-role
/// data (votes, progress) — used purely for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTag {
    Follower,
    Candidate,
    Leader,
}

/// Volatile state useful to a driver deciding what to do with a replica
/// without reaching into its internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftState {
    pub leader_id: NodeId,
    pub role: RoleTag,
}

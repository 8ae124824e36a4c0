/*!
 * The message-in / message-out contract used by the transport layer
 * (spec §6). The core never imports a transport; it only produces and
 * consumes `Message` values.
 */

use serde::{Deserialize, Serialize};

use crate::types::{LogEntry, NodeId, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Internal: drives election start on a Follower/Candidate.
    Hup,
    /// Internal: drives heartbeat broadcast on a Leader.
    Beat,
    /// Client write submission.
    Propose,
    Append,
    AppendResponse,
    RequestVote,
    RequestVoteResponse,
    Heartbeat,
    HeartbeatResponse,
    /// Stub — cluster membership/snapshot transfer is out of scope.
    Snapshot,
}

impl MessageType {
    /// Internal, locally-injected messages never carry peer semantics and
    /// are exempt from the generic higher-term step-down rule (spec §4.4).
    pub fn is_internal(self) -> bool {
        matches!(self, MessageType::Hup | MessageType::Beat | MessageType::Propose)
    }
}

/// A message flowing between replicas (or injected locally). Not every
/// field is meaningful for every `msg_type`; unused fields default to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MessageType,
    pub from: NodeId,
    pub to: NodeId,
    pub term: Term,
    pub index: u64,
    pub log_term: Term,
    pub entries: Vec<LogEntry>,
    pub commit: u64,
    pub reject: bool,
}

impl Message {
    pub fn new(msg_type: MessageType, from: NodeId, to: NodeId, term: Term) -> Self {
        Message {
            msg_type,
            from,
            to,
            term,
            index: 0,
            log_term: 0,
            entries: Vec::new(),
            commit: 0,
            reject: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A network transport would hand `Message` to `bincode` on the wire;
    // this pins that encoding stays round-trip safe even though the
    // in-process `ChannelTransport` never needs to serialize at all.
    #[test]
    fn round_trips_through_bincode() {
        let mut m = Message::new(MessageType::Append, 1, 2, 7);
        m.entries.push(LogEntry { term: 7, index: 3, data: vec![1, 2, 3] });
        m.commit = 2;

        let bytes = bincode::serialize(&m).unwrap();
        let back: Message = bincode::deserialize(&bytes).unwrap();

        assert_eq!(back.msg_type, MessageType::Append);
        assert_eq!(back.from, 1);
        assert_eq!(back.entries[0].data, vec![1, 2, 3]);
    }
}

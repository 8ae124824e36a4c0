/*!
 * Transport collaborator (spec §6, expansion): the core never performs I/O
 * itself, so every demo/test driver needs something to move `Message`
 * values between replicas. `ChannelTransport` is an in-process reference
 * implementation over `std::sync::mpsc`, used by the cluster demo and the
 * integration tests — never by the core.
 */

use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::message::Message;
use crate::types::NodeId;

/// Moves messages between replicas. The core only ever produces messages
/// via `take_messages()` and consumes them via `step()`; a `Transport` is
/// how a driver gets one replica's outbound messages to another's inbound
/// queue.
pub trait Transport {
    fn send(&self, m: Message);
    fn recv(&self, node: NodeId) -> Option<Message>;
}

/// An in-process transport wiring a fixed set of node ids together with
/// one `mpsc` channel per recipient. Messages addressed to an unknown node
/// are silently dropped, mirroring an unreachable peer on a real network.
#[derive(Clone)]
pub struct ChannelTransport {
    inboxes: Arc<HashMap<NodeId, Sender<Message>>>,
    receivers: Arc<Mutex<HashMap<NodeId, Receiver<Message>>>>,
}

impl ChannelTransport {
    /// Build a fully connected mesh for `nodes`.
    pub fn new(nodes: &[NodeId]) -> Self {
        let mut inboxes = HashMap::new();
        let mut receivers = HashMap::new();
        for &id in nodes {
            let (tx, rx) = std::sync::mpsc::channel();
            inboxes.insert(id, tx);
            receivers.insert(id, rx);
        }
        ChannelTransport {
            inboxes: Arc::new(inboxes),
            receivers: Arc::new(Mutex::new(receivers)),
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, m: Message) {
        if let Some(tx) = self.inboxes.get(&m.to) {
            // An already-shut-down receiver means the node has no further
            // use for messages; dropping is the correct behavior.
            let _ = tx.send(m);
        } else {
            log::warn!("dropping message to unknown node {}", m.to);
        }
    }

    fn recv(&self, node: NodeId) -> Option<Message> {
        let receivers = self.receivers.lock();
        match receivers.get(&node) {
            Some(rx) => match rx.try_recv() {
                Ok(m) => Some(m),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => None,
            },
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    #[test]
    fn delivers_to_the_right_inbox() {
        let transport = ChannelTransport::new(&[1, 2, 3]);
        transport.send(Message::new(MessageType::Heartbeat, 1, 2, 1));

        assert!(transport.recv(3).is_none());
        let got = transport.recv(2).unwrap();
        assert_eq!(got.from, 1);
        assert_eq!(got.msg_type, MessageType::Heartbeat);
    }

    #[test]
    fn send_to_unknown_node_is_dropped_not_panicking() {
        let transport = ChannelTransport::new(&[1, 2]);
        transport.send(Message::new(MessageType::Heartbeat, 1, 99, 1));
        assert!(transport.recv(1).is_none());
        assert!(transport.recv(2).is_none());
    }
}

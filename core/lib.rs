/*!
 * A deterministic, tick-driven Raft consensus replica core.
 *
 * `RaftCore` implements leader election, log replication, and heartbeats
 * behind a transport-free `tick()`/`step()` API: it never performs I/O,
 * never spawns a thread, and never blocks. A driver feeds it ticks and
 * inbound messages, drains `take_messages()` after every call, and is
 * responsible for wiring those messages to a real transport and the
 * unstable log entries to durable storage.
 *
 * Collaborators the core depends on through traits only:
 * - [`storage::Storage`] — durable log and hard state.
 * - [`rand_source::RandomTimeout`] — the randomized portion of the
 *   election timeout, injectable for deterministic tests.
 *
 * Everything under [`transport`] (and the demo binaries at the crate
 * root) is a reference implementation for driving a `RaftCore`, not part
 * of the consensus core itself.
 */

pub mod config;
pub mod error;
pub mod message;
pub mod progress;
pub mod raft;
pub mod raft_log;
pub mod rand_source;
pub mod storage;
pub mod transport;
pub mod types;

pub use config::{ConfigFileError, NodeConfig, RaftConfig};
pub use error::{Error, Result};
pub use message::{Message, MessageType};
pub use progress::{Progress, ProgressSet};
pub use raft::{ConfChange, RaftCore};
pub use raft_log::RaftLog;
pub use rand_source::{FixedTimeout, RandomTimeout, ThreadRngTimeout};
pub use storage::{InitialState, MemStorage, Storage};
pub use transport::{ChannelTransport, Transport};
pub use types::{ConfState, HardState, LogEntry, NodeId, RoleTag, SoftState, Term, NONE};

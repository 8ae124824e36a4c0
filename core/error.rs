/*!
 * Error taxonomy for the replica, its storage collaborator, and construction.
 */

use thiserror::Error;

use crate::message::MessageType;
use crate::types::NodeId;

/// Fatal, construction-time configuration errors (spec §4.1 / §7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("node id must be non-zero")]
    ZeroId,

    #[error("heartbeat tick count must be greater than zero")]
    NonPositiveHeartbeat,

    #[error("election tick count ({election}) must be greater than heartbeat tick count ({heartbeat})")]
    ElectionNotGreaterThanHeartbeat { election: u64, heartbeat: u64 },
}

/// Errors surfaced by the `Storage` collaborator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("requested index {0} is not available in storage")]
    Unavailable(u64),

    #[error("storage is empty")]
    Empty,
}

/// Top-level error type returned by `RaftCore` construction and message handling.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("proposal dropped: {0}")]
    ProposalDropped(&'static str),

    #[error("message of type {msg_type:?} from {from} carried term 0, which is only valid for internal messages")]
    OutOfProtocol { msg_type: MessageType, from: NodeId },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

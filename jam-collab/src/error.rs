use jam_core::{ProviderError, QueueError};
use thiserror::Error;

pub type CollabResult<T> = std::result::Result<T, CollabError>;

/// Everything that can reject an operation on a jam.
/// A rejected operation never leaves a jam partially changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollabError {
    #[error("Jam {0} does not exist")]
    NotFound(String),
    #[error("{0} is already a member of this jam")]
    AlreadyMember(String),
    #[error("{0} is reserved and can't be used by a member")]
    ReservedIdentity(String),
    #[error("{0} is not a member of this jam")]
    NotAMember(String),
    #[error("Member lacks the permissions for this operation")]
    PermissionDenied,
    /// No free label could be found. This is a capacity problem, not a transient one.
    #[error("Could not find a free label after {attempts} attempts")]
    LabelExhaustion { attempts: usize },
    #[error("Jam {0} is closed")]
    SessionClosed(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

mod queue;
mod song;

pub use queue::*;
pub use song::*;

use serde::Serialize;
use thiserror::Error;

use crate::Track;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Song {0} is not in the queue")]
    NotFound(String),
    #[error("The queue is empty")]
    Empty,
    /// The supplied track does not carry the identity of the song being voted for
    #[error("Payload does not identify song {0}")]
    MalformedPayload(String),
}

/// A song as rendered for clients.
#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub track: Track,
    pub votes: usize,
    /// Whether the voter this entry was rendered for has voted on the song
    pub voted: bool,
}

impl QueueEntry {
    pub fn for_voter(song: &Song, voter: &str) -> Self {
        Self {
            track: song.track().clone(),
            votes: song.vote_count(),
            voted: song.has_vote(voter),
        }
    }

    pub fn anonymous(song: &Song) -> Self {
        Self {
            track: song.track().clone(),
            votes: song.vote_count(),
            voted: false,
        }
    }
}

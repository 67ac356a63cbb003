use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, Utc};

use crate::Track;

/// A candidate track inside one session's queue, along with who voted for it.
#[derive(Debug, Clone)]
pub struct Song {
    track: Track,
    /// Voter id to cast state. A voter who took their vote back stays in the map as `false`.
    votes: HashMap<String, bool>,
    /// Tie-break for songs with an equal amount of votes. Set once, when the song is created.
    first_voted_at: DateTime<Utc>,
}

impl Song {
    pub fn new(track: Track, first_voted_at: DateTime<Utc>) -> Self {
        Self {
            track,
            votes: Default::default(),
            first_voted_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.track.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn first_voted_at(&self) -> DateTime<Utc> {
        self.first_voted_at
    }

    /// Toggles the vote of `voter`, returning true if the voter now has a vote on this song.
    ///
    /// Exclusive access is required, so concurrent voters are serialized by whoever owns the song.
    pub fn vote(&mut self, voter: &str) -> bool {
        let cast = self.votes.entry(voter.to_string()).or_insert(false);
        *cast = !*cast;

        *cast
    }

    pub fn vote_count(&self) -> usize {
        self.votes.values().filter(|cast| **cast).count()
    }

    pub fn has_vote(&self, voter: &str) -> bool {
        self.votes.get(voter).copied().unwrap_or_default()
    }

    /// Ranking order: more votes first, then earlier first vote.
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .vote_count()
            .cmp(&self.vote_count())
            .then(self.first_voted_at.cmp(&other.first_voted_at))
    }
}

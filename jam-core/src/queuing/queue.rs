use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{now, Config, Track};

use super::{QueueEntry, QueueError, Song};

/// The voter id used when the host fills the queue in bulk.
/// Songs first voted by it are stamped in the future, so they rank after guest picks.
pub const HOST_VOTER: &str = "jam:host";

const RESERVED_VOTER_PREFIX: &str = "jam:";

/// Whether `identity` is one of the voters the jam casts votes as itself.
/// Such identities can't belong to people.
pub fn is_reserved_voter(identity: &str) -> bool {
    identity.starts_with(RESERVED_VOTER_PREFIX)
}

/// A queue of songs ranked by votes.
///
/// Every method takes the internal lock for its whole duration,
/// so readers never observe a queue that is not sorted.
pub struct RankedQueue {
    config: Config,
    inner: Mutex<QueueInner>,
}

#[derive(Default)]
struct QueueInner {
    songs: Vec<Song>,
    /// Songs that were advanced past, oldest first
    history: VecDeque<Song>,
}

impl RankedQueue {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            inner: Default::default(),
        }
    }

    /// Toggles `voter`'s vote on the song, creating the song from `track` if it isn't queued.
    /// Returns true if the voter now has a vote on the song.
    pub fn vote(&self, song_id: &str, voter: &str, track: Track) -> Result<bool, QueueError> {
        if !track.is_identified_by(song_id) {
            return Err(QueueError::MalformedPayload(song_id.to_string()));
        }

        let mut inner = self.inner.lock();

        let voted = match inner.songs.iter_mut().find(|s| s.id() == song_id) {
            Some(song) => song.vote(voter),
            None => {
                let mut song = Song::new(track, self.first_voted_at(voter));
                let voted = song.vote(voter);

                inner.songs.push(song);
                voted
            }
        };

        inner.settle();
        Ok(voted)
    }

    /// Toggles `voter`'s vote on a song that is already queued.
    pub fn vote_existing(&self, song_id: &str, voter: &str) -> Result<bool, QueueError> {
        let mut inner = self.inner.lock();

        let voted = inner
            .songs
            .iter_mut()
            .find(|s| s.id() == song_id)
            .map(|s| s.vote(voter))
            .ok_or_else(|| QueueError::NotFound(song_id.to_string()))?;

        inner.settle();
        Ok(voted)
    }

    /// Removes a song regardless of its votes.
    pub fn delete(&self, song_id: &str) -> Result<Song, QueueError> {
        let mut inner = self.inner.lock();

        let index = inner
            .songs
            .iter()
            .position(|s| s.id() == song_id)
            .ok_or_else(|| QueueError::NotFound(song_id.to_string()))?;

        let song = inner.songs.remove(index);

        inner.settle();
        Ok(song)
    }

    /// Removes the head of the queue and records it in the history.
    pub fn advance(&self) -> Result<Song, QueueError> {
        let mut inner = self.inner.lock();

        if inner.songs.is_empty() {
            return Err(QueueError::Empty);
        }

        let song = inner.songs.remove(0);
        inner.history.push_back(song.clone());

        while inner.history.len() > self.config.history_limit {
            inner.history.pop_front();
        }

        Ok(song)
    }

    /// Returns the head of the queue without removing it.
    pub fn peek_next(&self) -> Result<Song, QueueError> {
        self.inner
            .lock()
            .songs
            .first()
            .cloned()
            .ok_or(QueueError::Empty)
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.inner.lock().songs.iter().any(|s| s.id() == song_id)
    }

    pub fn has_vote(&self, song_id: &str, voter: &str) -> bool {
        self.inner
            .lock()
            .songs
            .iter()
            .any(|s| s.id() == song_id && s.has_vote(voter))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().songs.is_empty()
    }

    /// The queue as seen by `voter`, in ranking order.
    pub fn view_for(&self, voter: &str) -> Vec<QueueEntry> {
        let inner = self.inner.lock();
        inner.songs.iter().map(|s| QueueEntry::for_voter(s, voter)).collect()
    }

    /// The queue without any voter context, in ranking order.
    pub fn tracks(&self) -> Vec<QueueEntry> {
        let inner = self.inner.lock();
        inner.songs.iter().map(QueueEntry::anonymous).collect()
    }

    /// The played songs as seen by `voter`, oldest first.
    pub fn history_for(&self, voter: &str) -> Vec<QueueEntry> {
        let inner = self.inner.lock();
        inner.history.iter().map(|s| QueueEntry::for_voter(s, voter)).collect()
    }

    /// The played tracks, oldest first.
    pub fn history_tracks(&self) -> Vec<Track> {
        let inner = self.inner.lock();
        inner.history.iter().map(|s| s.track().clone()).collect()
    }

    fn first_voted_at(&self, voter: &str) -> DateTime<Utc> {
        if voter == HOST_VOTER {
            now() + self.config.host_vote_offset()
        } else {
            now()
        }
    }
}

impl QueueInner {
    /// Drops songs nobody votes for anymore and restores ranking order.
    fn settle(&mut self) {
        self.songs.retain(|s| s.vote_count() > 0);
        // sort_by is stable, so equal songs keep their insertion order
        self.songs.sort_by(|a, b| a.rank(b));
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    fn queue() -> RankedQueue {
        RankedQueue::new(&Config::default())
    }

    fn vote(queue: &RankedQueue, id: &str, voter: &str) -> bool {
        queue
            .vote(id, voter, Track::mock(id, 1000))
            .expect("vote succeeds")
    }

    fn ids(entries: Vec<QueueEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.track.id).collect()
    }

    fn is_sorted(entries: &[QueueEntry]) -> bool {
        entries.windows(2).all(|w| w[0].votes >= w[1].votes)
    }

    #[test]
    fn test_vote_creates_and_toggles() {
        let queue = queue();

        assert!(vote(&queue, "T1", "alice"), "alice voted");
        assert!(vote(&queue, "T1", "bob"), "bob voted");
        assert_eq!(queue.len(), 1, "still one song");
        assert_eq!(queue.tracks()[0].votes, 2, "two votes");

        assert!(!vote(&queue, "T1", "alice"), "alice took the vote back");
        assert_eq!(queue.tracks()[0].votes, 1, "one vote");

        let view = queue.view_for("bob");
        assert!(view[0].voted, "bob sees a cast vote");
        assert!(!queue.view_for("alice")[0].voted, "alice sees no vote");
        assert!(!queue.tracks()[0].voted, "anonymous view never marks votes");
    }

    #[test]
    fn test_zero_votes_are_removed() {
        let queue = queue();

        vote(&queue, "T1", "alice");
        vote(&queue, "T1", "alice");

        assert!(queue.is_empty(), "song without votes is removed");
        assert!(!queue.contains("T1"), "song is gone");
    }

    #[test]
    fn test_ordering() {
        let queue = queue();

        vote(&queue, "A", "alice");
        vote(&queue, "B", "alice");
        vote(&queue, "C", "alice");
        vote(&queue, "C", "bob");

        assert_eq!(ids(queue.tracks()), vec!["C", "A", "B"], "votes first, then age");

        vote(&queue, "B", "bob");
        vote(&queue, "B", "carol");

        assert_eq!(ids(queue.tracks()), vec!["B", "C", "A"], "re-sorted after vote");
    }

    #[test]
    fn test_host_votes_rank_after_guests() {
        let queue = queue();

        vote(&queue, "H1", HOST_VOTER);
        vote(&queue, "H2", HOST_VOTER);
        vote(&queue, "G1", "guest");

        assert_eq!(
            ids(queue.tracks()),
            vec!["G1", "H1", "H2"],
            "guest pick ranks before earlier host fill, host fill keeps insertion order"
        );
    }

    #[test]
    fn test_reserved_voters() {
        assert!(is_reserved_voter(HOST_VOTER), "host fill is reserved");
        assert!(is_reserved_voter("jam:anything"), "whole namespace is reserved");
        assert!(!is_reserved_voter("guest"), "people are not");
        assert!(!is_reserved_voter("jamie"), "prefix needs the colon");
    }

    #[test]
    fn test_malformed_payload() {
        let queue = queue();
        let result = queue.vote("T1", "alice", Track::mock("T2", 1000));

        assert_eq!(
            result,
            Err(QueueError::MalformedPayload("T1".to_string())),
            "payload must identify the song"
        );
        assert!(queue.is_empty(), "nothing was queued");
    }

    #[test]
    fn test_vote_existing() {
        let queue = queue();

        assert_eq!(
            queue.vote_existing("T1", "alice"),
            Err(QueueError::NotFound("T1".to_string())),
            "unknown song"
        );

        vote(&queue, "T1", "alice");
        assert_eq!(queue.vote_existing("T1", "bob"), Ok(true), "bob voted");
    }

    #[test]
    fn test_delete() {
        let queue = queue();

        vote(&queue, "T1", "alice");
        vote(&queue, "T1", "bob");

        assert!(queue.delete("T1").is_ok(), "deleted regardless of votes");
        assert!(queue.is_empty(), "queue is empty");
        assert_eq!(
            queue.delete("T1").map(|s| s.id().to_string()),
            Err(QueueError::NotFound("T1".to_string())),
            "second delete fails"
        );
    }

    #[test]
    fn test_advance() {
        let queue = queue();

        assert_eq!(queue.advance().err(), Some(QueueError::Empty), "empty queue");
        assert_eq!(queue.peek_next().err(), Some(QueueError::Empty), "empty peek");

        vote(&queue, "A", "alice");
        vote(&queue, "B", "alice");
        vote(&queue, "B", "bob");

        let peeked = queue.peek_next().expect("queue has a head");
        let advanced = queue.advance().expect("queue advances");

        assert_eq!(peeked.id(), advanced.id(), "advance removes the peeked song");
        assert_eq!(advanced.id(), "B", "head was the most voted song");
        assert_eq!(ids(queue.tracks()), vec!["A"], "one song left");

        let history = queue.history_for("bob");
        assert_eq!(history.len(), 1, "advanced song is in the history");
        assert!(history[0].voted, "history keeps the voter projection");
    }

    #[test]
    fn test_history_limit() {
        let queue = RankedQueue::new(&Config {
            history_limit: 2,
            ..Default::default()
        });

        for id in ["A", "B", "C"] {
            vote(&queue, id, "alice");
            queue.advance().expect("queue advances");
        }

        let history: Vec<_> = queue.history_tracks().into_iter().map(|t| t.id).collect();
        assert_eq!(history, vec!["B", "C"], "oldest entries are dropped");
    }

    #[test]
    fn test_concurrent_votes() {
        let queue = Arc::new(queue());
        vote(&queue, "T1", "seed");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let queue = queue.clone();

                thread::spawn(move || {
                    let voter = format!("voter-{}", i);

                    // Odd voters vote twice and end up without a vote
                    let times = if i % 2 == 0 { 1 } else { 2 };

                    for _ in 0..times {
                        queue
                            .vote("T1", &voter, Track::mock("T1", 1000))
                            .expect("vote succeeds");

                        assert!(is_sorted(&queue.tracks()), "never observably unsorted");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("voter thread finishes");
        }

        assert_eq!(queue.tracks()[0].votes, 9, "seed plus eight even voters");
    }
}

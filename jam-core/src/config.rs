use std::time::Duration;

use chrono::TimeDelta;

/// Symbols a session label is drawn from. Visually ambiguous characters (I, 0) are left out.
pub const LABEL_ALPHABET: &str = "ABCDEFGHJKLMNOPQRSTUVWXYZ123456789";

/// The configuration shared by every session in a process
#[derive(Debug, Clone)]
pub struct Config {
    /// How often the conductor polls the external player
    pub tick_interval: Duration,
    /// How close to the end of a track the conductor starts the next one, in milliseconds
    pub end_of_track_threshold_ms: u64,
    /// How long after issuing a play command the conductor trusts its own bookkeeping
    /// over what the player reports
    pub advance_settle_time: Duration,
    /// How many outbound messages a client may have pending before it is dropped
    pub client_buffer_size: usize,
    /// How often clients are pinged
    pub ping_interval: Duration,
    /// How long a client may go without answering a ping
    pub pong_deadline: Duration,
    /// How many characters a session label has
    pub label_length: usize,
    /// How many times label generation may collide before giving up
    pub label_retries: usize,
    /// How far into the future host-fill votes are stamped, in days
    pub host_vote_offset_days: i64,
    /// How long search results are cached for. `None` disables the cache.
    pub search_cache_ttl: Option<Duration>,
    /// How many played songs are retained per session
    pub history_limit: usize,
}

impl Config {
    /// The offset applied to the first vote of a host-fill song
    pub fn host_vote_offset(&self) -> TimeDelta {
        TimeDelta::days(self.host_vote_offset_days)
    }

    /// Returns true if `progress_ms` is within the end-of-track threshold of `duration_ms`
    pub fn is_near_end(&self, progress_ms: u64, duration_ms: u64) -> bool {
        duration_ms > 0 && duration_ms.saturating_sub(progress_ms) <= self.end_of_track_threshold_ms
    }

    /// A config suitable for driving a conductor by hand, with no settle window.
    pub fn immediate() -> Self {
        Self {
            advance_settle_time: Duration::ZERO,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            end_of_track_threshold_ms: 1000,
            // Providers take a moment before they report a newly started track
            advance_settle_time: Duration::from_secs(2),
            client_buffer_size: 64,
            ping_interval: Duration::from_secs(30),
            pong_deadline: Duration::from_secs(60),
            label_length: 5,
            label_retries: 10,
            host_vote_offset_days: 365,
            search_cache_ttl: Some(Duration::from_secs(60 * 5)),
            history_limit: 50,
        }
    }
}

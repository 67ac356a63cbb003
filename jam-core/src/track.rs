use serde::{Deserialize, Serialize};

/// Metadata of a track as reported by the streaming provider.
///
/// The session never interprets this beyond `id`, which identifies the song in a queue,
/// `uri`, which is handed back to the provider to start playback, and `duration_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    /// What the provider expects when asked to play this track
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    pub artwork: Option<String>,
}

impl Track {
    /// Returns true if this track carries enough identity to be queued under `song_id`
    pub fn is_identified_by(&self, song_id: &str) -> bool {
        !self.id.is_empty() && !self.uri.is_empty() && self.id == song_id
    }

    /// A minimal track, mostly useful for tests and simulated catalogs.
    pub fn mock(id: &str, duration_ms: u64) -> Self {
        Self {
            id: id.to_string(),
            uri: format!("jam:track:{}", id),
            name: id.to_string(),
            artists: vec![],
            album: None,
            duration_ms,
            artwork: None,
        }
    }
}

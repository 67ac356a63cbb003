use std::collections::HashMap;

use jam_core::{Collection, CollectionKind, SearchKind, SearchResults, Track};

/// The tracks, playlists and albums a simulated account can reach.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: HashMap<String, Track>,
    collections: HashMap<(CollectionKind, String), (Collection, Vec<String>)>,
}

impl Catalog {
    pub fn add_track(&mut self, track: Track) -> &mut Self {
        self.tracks.insert(track.id.clone(), track);
        self
    }

    /// Adds a playlist or album along with all of its tracks.
    pub fn add_collection(
        &mut self,
        kind: CollectionKind,
        id: &str,
        name: &str,
        tracks: Vec<Track>,
    ) -> Collection {
        let collection = Collection {
            id: id.to_string(),
            kind,
            name: name.to_string(),
            track_count: tracks.len(),
            artwork: None,
        };

        let track_ids = tracks.iter().map(|t| t.id.clone()).collect();

        for track in tracks {
            self.add_track(track);
        }

        self.collections.insert(
            (kind, id.to_string()),
            (collection.clone(), track_ids),
        );

        collection
    }

    pub fn track(&self, id: &str) -> Option<Track> {
        self.tracks.get(id).cloned()
    }

    pub fn track_by_uri(&self, uri: &str) -> Option<Track> {
        self.tracks.values().find(|t| t.uri == uri).cloned()
    }

    pub fn collection_tracks(&self, kind: CollectionKind, id: &str) -> Option<Vec<Track>> {
        let (_, track_ids) = self.collections.get(&(kind, id.to_string()))?;

        Some(track_ids.iter().filter_map(|id| self.track(id)).collect())
    }

    pub fn collections(&self, kind: CollectionKind) -> Vec<Collection> {
        let mut collections: Vec<_> = self
            .collections
            .values()
            .map(|(c, _)| c)
            .filter(|c| c.kind == kind)
            .cloned()
            .collect();

        collections.sort_by(|a, b| a.id.cmp(&b.id));
        collections
    }

    /// Case-insensitive substring search over names and artists.
    pub fn search(&self, query: &str, kind: SearchKind) -> SearchResults {
        let query = query.to_lowercase();
        let matches = |text: &str| text.to_lowercase().contains(&query);

        match kind {
            SearchKind::Track => {
                let mut tracks: Vec<_> = self
                    .tracks
                    .values()
                    .filter(|t| matches(&t.name) || t.artists.iter().any(|a| matches(a)))
                    .cloned()
                    .collect();

                tracks.sort_by(|a, b| a.name.cmp(&b.name));

                SearchResults {
                    tracks,
                    collections: vec![],
                }
            }
            SearchKind::Playlist | SearchKind::Album => {
                let kind = match kind {
                    SearchKind::Album => CollectionKind::Album,
                    _ => CollectionKind::Playlist,
                };

                SearchResults {
                    tracks: vec![],
                    collections: self
                        .collections(kind)
                        .into_iter()
                        .filter(|c| matches(&c.name))
                        .collect(),
                }
            }
        }
    }

    /// A small catalog to play around with.
    pub fn demo() -> Self {
        let track = |id: &str, name: &str, artist: &str, album: &str, duration_ms: u64| Track {
            id: id.to_string(),
            uri: format!("jam:track:{}", id),
            name: name.to_string(),
            artists: vec![artist.to_string()],
            album: Some(album.to_string()),
            duration_ms,
            artwork: None,
        };

        let night_drive = vec![
            track("nd1", "Neon Avenue", "Glasshouse", "Night Drive", 214_000),
            track("nd2", "Tunnel Lights", "Glasshouse", "Night Drive", 187_000),
            track("nd3", "Last Exit", "Glasshouse", "Night Drive", 242_000),
        ];

        let picks = vec![
            track("sp1", "Paper Boats", "The Lowlands", "Harbour", 198_000),
            track("sp2", "Copper Sky", "Mira Vale", "Copper Sky", 225_000),
            night_drive[0].clone(),
        ];

        let mut catalog = Self::default();

        catalog.add_collection(CollectionKind::Album, "night-drive", "Night Drive", night_drive);
        catalog.add_collection(CollectionKind::Playlist, "sunday-picks", "Sunday Picks", picks);
        catalog.add_track(track("ls1", "Lone Signal", "Mira Vale", "Copper Sky", 176_000));

        catalog
    }
}

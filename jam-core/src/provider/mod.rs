//! The streaming provider a session drives. Everything behind this boundary is opaque.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod state;

pub use state::*;

use crate::Track;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A provider handle shared between a session and its conductor
pub type SharedProvider = Arc<dyn PlaybackProvider>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The target device is not active. Callers should ask for a device, not retry.
    #[error("No active device to play on")]
    DeviceNotActive,
    #[error("{resource} {id} was not found")]
    NotFound { resource: &'static str, id: String },
    #[error("Provider is unavailable: {0}")]
    Unavailable(String),
    #[error("Provider request failed: {0}")]
    Request(String),
}

/// The capability of a streaming account.
#[async_trait]
pub trait PlaybackProvider
where
    Self: Send + Sync + 'static,
{
    /// Returns what the player is currently doing.
    async fn current_playback(&self) -> ProviderResult<PlaybackState>;

    /// Plays the given uris, or resumes playback if `uris` is empty.
    async fn play(&self, uris: &[String], device_id: Option<&str>) -> ProviderResult<()>;

    async fn pause(&self) -> ProviderResult<()>;

    async fn seek(&self, position_ms: u64) -> ProviderResult<()>;

    async fn transfer_playback(&self, device_id: &str, start_playing: bool) -> ProviderResult<()>;

    async fn set_volume(&self, percent: u8) -> ProviderResult<()>;

    async fn track(&self, id: &str) -> ProviderResult<Track>;

    async fn playlist_tracks(&self, id: &str) -> ProviderResult<Vec<Track>>;

    async fn album_tracks(&self, id: &str) -> ProviderResult<Vec<Track>>;

    async fn devices(&self) -> ProviderResult<Vec<Device>>;

    async fn current_user_playlists(&self) -> ProviderResult<Vec<Collection>>;

    async fn create_playlist(
        &self,
        name: &str,
        description: &str,
        track_ids: &[String],
    ) -> ProviderResult<Collection>;

    async fn search(&self, query: &str, kind: SearchKind) -> ProviderResult<SearchResults>;

    /// Returns all tracks of a playlist or album.
    async fn collection_tracks(&self, kind: CollectionKind, id: &str) -> ProviderResult<Vec<Track>> {
        match kind {
            CollectionKind::Playlist => self.playlist_tracks(id).await,
            CollectionKind::Album => self.album_tracks(id).await,
        }
    }
}

/// Binds a host identity to a provider handle when a session is created.
#[async_trait]
pub trait ProviderConnector
where
    Self: Send + Sync + 'static,
{
    async fn connect(&self, host: &str) -> ProviderResult<SharedProvider>;
}

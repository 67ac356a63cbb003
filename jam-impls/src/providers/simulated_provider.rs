use std::time::Instant;

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use jam_core::{
    Collection, CollectionKind, Device, Introspect, PlaybackProvider, PlaybackState,
    ProviderError, ProviderResult, SearchKind, SearchResults, Track,
};
use log::debug;
use parking_lot::{Mutex, RwLock};

use super::Catalog;

/// A playback provider that plays a [Catalog] on pretend devices.
///
/// Progress advances with wall-clock time while playing. A track that runs out
/// leaves the player stopped at zero progress, like a real player at the end of its queue.
pub struct SimulatedProvider {
    catalog: RwLock<Catalog>,
    player: Mutex<Player>,
    searches: AtomicCell<usize>,
    /// Returned by every call while set
    failure: Mutex<Option<ProviderError>>,
    /// Returned by the named call while set
    call_failures: DashMap<&'static str, ProviderError>,
}

struct Player {
    playing: bool,
    track: Option<Track>,
    /// Progress at the time of `anchor`
    position_ms: u64,
    anchor: Instant,
    devices: Vec<Device>,
    plays: Vec<String>,
    resumes: usize,
    transfers: Vec<String>,
    created_playlists: usize,
}

#[derive(Debug, Clone)]
pub struct SimulatedIntrospection {
    pub playing: bool,
    pub progress_ms: u64,
    pub track_id: Option<String>,
    pub device_id: Option<String>,
    pub volume: Option<u8>,
    /// The uri of every track started, in order
    pub plays: Vec<String>,
    pub resumes: usize,
    pub transfers: Vec<String>,
    pub created_playlists: usize,
    pub searches: usize,
}

impl Player {
    fn new() -> Self {
        let device = |id: &str, name: &str, active: bool| Device {
            id: id.to_string(),
            name: name.to_string(),
            active,
            volume_percent: Some(50),
        };

        Self {
            playing: false,
            track: None,
            position_ms: 0,
            anchor: Instant::now(),
            devices: vec![
                device("sim-speaker", "Living room speaker", true),
                device("sim-phone", "Phone", false),
            ],
            plays: vec![],
            resumes: 0,
            transfers: vec![],
            created_playlists: 0,
        }
    }

    /// Folds elapsed time into the position, stopping the player if the track ran out.
    fn sync(&mut self) {
        let now = Instant::now();

        if self.playing {
            let elapsed = now.duration_since(self.anchor).as_millis() as u64;
            let duration = self.track.as_ref().map(|t| t.duration_ms).unwrap_or_default();

            self.position_ms += elapsed;

            if self.position_ms >= duration {
                self.playing = false;
                self.position_ms = 0;
            }
        }

        self.anchor = now;
    }

    fn active_device(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.active)
    }

    fn activate_device(&mut self, device_id: &str) -> ProviderResult<()> {
        if !self.devices.iter().any(|d| d.id == device_id) {
            return Err(ProviderError::NotFound {
                resource: "device",
                id: device_id.to_string(),
            });
        }

        for device in &mut self.devices {
            device.active = device.id == device_id;
        }

        Ok(())
    }

    fn require_active_device(&self) -> ProviderResult<()> {
        self.active_device()
            .map(|_| ())
            .ok_or(ProviderError::DeviceNotActive)
    }

    fn state(&self) -> PlaybackState {
        PlaybackState {
            playing: self.playing,
            progress_ms: self.position_ms,
            track: self.track.clone(),
            device: self.active_device().cloned(),
        }
    }
}

impl SimulatedProvider {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            player: Mutex::new(Player::new()),
            searches: AtomicCell::new(0),
            failure: Mutex::new(None),
            call_failures: DashMap::new(),
        }
    }

    /// Makes every call fail with `failure` until it is cleared with `None`.
    pub fn set_failure(&self, failure: Option<ProviderError>) {
        *self.failure.lock() = failure;
    }

    /// Makes only `call`, named like its trait method, fail with `failure`.
    pub fn fail_call(&self, call: &'static str, failure: Option<ProviderError>) {
        match failure {
            Some(failure) => {
                self.call_failures.insert(call, failure);
            }
            None => {
                self.call_failures.remove(call);
            }
        }
    }

    /// Runs the current track out, leaving the player stopped at zero progress.
    pub fn finish_track(&self) {
        let mut player = self.player.lock();
        player.sync();

        player.playing = false;
        player.position_ms = 0;
    }

    pub fn set_progress(&self, position_ms: u64) {
        let mut player = self.player.lock();
        player.sync();

        player.position_ms = position_ms;
    }

    /// Starts a track as if someone used the player directly.
    pub fn play_elsewhere(&self, track_id: &str) {
        let track = self.catalog.read().track(track_id);
        let mut player = self.player.lock();
        player.sync();

        player.track = track;
        player.position_ms = 0;
        player.playing = true;
    }

    /// Pauses as if someone used the player directly.
    pub fn pause_elsewhere(&self) {
        let mut player = self.player.lock();
        player.sync();

        player.playing = false;
    }

    /// Disconnects every device, so playing without naming one fails.
    pub fn deactivate_devices(&self) {
        for device in &mut self.player.lock().devices {
            device.active = false;
        }
    }

    fn check(&self, call: &'static str) -> ProviderResult<()> {
        if let Some(failure) = &*self.failure.lock() {
            return Err(failure.clone());
        }

        match self.call_failures.get(call) {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PlaybackProvider for SimulatedProvider {
    async fn current_playback(&self) -> ProviderResult<PlaybackState> {
        self.check("current_playback")?;

        let mut player = self.player.lock();
        player.sync();

        Ok(player.state())
    }

    async fn play(&self, uris: &[String], device_id: Option<&str>) -> ProviderResult<()> {
        self.check("play")?;

        let track = match uris.first() {
            Some(uri) => Some(self.catalog.read().track_by_uri(uri).ok_or_else(|| {
                ProviderError::NotFound {
                    resource: "track",
                    id: uri.clone(),
                }
            })?),
            None => None,
        };

        let mut player = self.player.lock();
        player.sync();

        match device_id {
            Some(id) => player.activate_device(id)?,
            None => player.require_active_device()?,
        }

        match track {
            Some(track) => {
                debug!("Simulated player starts {}", track.uri);

                player.plays.push(track.uri.clone());
                player.track = Some(track);
                player.position_ms = 0;
            }
            None if player.track.is_none() => {
                return Err(ProviderError::Request("Nothing to resume".to_string()));
            }
            None => player.resumes += 1,
        }

        player.playing = true;
        Ok(())
    }

    async fn pause(&self) -> ProviderResult<()> {
        self.check("pause")?;

        let mut player = self.player.lock();
        player.require_active_device()?;
        player.sync();

        player.playing = false;
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> ProviderResult<()> {
        self.check("seek")?;

        let mut player = self.player.lock();
        player.require_active_device()?;
        player.sync();

        let duration = player.track.as_ref().map(|t| t.duration_ms).unwrap_or_default();
        player.position_ms = position_ms.min(duration);

        Ok(())
    }

    async fn transfer_playback(&self, device_id: &str, start_playing: bool) -> ProviderResult<()> {
        self.check("transfer_playback")?;

        let mut player = self.player.lock();
        player.sync();
        player.activate_device(device_id)?;

        player.transfers.push(device_id.to_string());

        if start_playing && player.track.is_some() {
            player.playing = true;
        }

        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> ProviderResult<()> {
        self.check("set_volume")?;

        let mut player = self.player.lock();
        let device = player
            .devices
            .iter_mut()
            .find(|d| d.active)
            .ok_or(ProviderError::DeviceNotActive)?;

        device.volume_percent = Some(percent.min(100));
        Ok(())
    }

    async fn track(&self, id: &str) -> ProviderResult<Track> {
        self.check("track")?;

        self.catalog
            .read()
            .track(id)
            .ok_or_else(|| ProviderError::NotFound {
                resource: "track",
                id: id.to_string(),
            })
    }

    async fn playlist_tracks(&self, id: &str) -> ProviderResult<Vec<Track>> {
        self.check("playlist_tracks")?;

        self.catalog
            .read()
            .collection_tracks(CollectionKind::Playlist, id)
            .ok_or_else(|| ProviderError::NotFound {
                resource: "playlist",
                id: id.to_string(),
            })
    }

    async fn album_tracks(&self, id: &str) -> ProviderResult<Vec<Track>> {
        self.check("album_tracks")?;

        self.catalog
            .read()
            .collection_tracks(CollectionKind::Album, id)
            .ok_or_else(|| ProviderError::NotFound {
                resource: "album",
                id: id.to_string(),
            })
    }

    async fn devices(&self) -> ProviderResult<Vec<Device>> {
        self.check("devices")?;
        Ok(self.player.lock().devices.clone())
    }

    async fn current_user_playlists(&self) -> ProviderResult<Vec<Collection>> {
        self.check("current_user_playlists")?;
        Ok(self.catalog.read().collections(CollectionKind::Playlist))
    }

    async fn create_playlist(
        &self,
        name: &str,
        _description: &str,
        track_ids: &[String],
    ) -> ProviderResult<Collection> {
        self.check("create_playlist")?;

        let mut catalog = self.catalog.write();
        let tracks = track_ids.iter().filter_map(|id| catalog.track(id)).collect();

        let mut player = self.player.lock();
        player.created_playlists += 1;

        let id = format!("sim-playlist-{}", player.created_playlists);
        Ok(catalog.add_collection(CollectionKind::Playlist, &id, name, tracks))
    }

    async fn search(&self, query: &str, kind: SearchKind) -> ProviderResult<SearchResults> {
        self.check("search")?;

        self.searches.fetch_add(1);
        Ok(self.catalog.read().search(query, kind))
    }
}

impl Introspect<SimulatedIntrospection> for SimulatedProvider {
    fn introspect(&self) -> SimulatedIntrospection {
        let mut player = self.player.lock();
        player.sync();

        let device = player.active_device();

        SimulatedIntrospection {
            playing: player.playing,
            progress_ms: player.position_ms,
            track_id: player.track.as_ref().map(|t| t.id.clone()),
            device_id: device.map(|d| d.id.clone()),
            volume: device.and_then(|d| d.volume_percent),
            plays: player.plays.clone(),
            resumes: player.resumes,
            transfers: player.transfers.clone(),
            created_playlists: player.created_playlists,
            searches: self.searches.load(),
        }
    }
}

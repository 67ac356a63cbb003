mod conductor;

use std::{sync::Arc, time::Duration};

use jam_core::{
    Client, Collection, CollectionKind, Config, Device, PlaybackState, QueueEntry, QueueError,
    is_reserved_voter, RankedQueue, Room, SearchKind, SearchResults, SharedProvider, Song, Track,
    HOST_VOTER,
};
use log::{debug, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{watch, Mutex as AsyncMutex, MutexGuard},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    CollabError, CollabResult, JamEvent, JamState, JamSummary, Member, Members, Permission,
    SearchCache,
};

/// A shared listening party, bound to the streaming account of its host.
///
/// The queue and the playback tracking fields are only touched while holding
/// the tracking lock, so request handlers and the conductor never interleave.
pub struct JamSession {
    label: String,
    host: String,
    config: Config,
    members: Members,
    queue: RankedQueue,
    room: Room,
    provider: SharedProvider,
    search: SearchCache,
    tracking: AsyncMutex<Tracking>,
    stop: watch::Sender<bool>,
    conductor: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
struct Tracking {
    name: String,
    /// Whether the jam drives playback. Distinct from `player.playing`.
    active: bool,
    /// The device chosen for this jam, if any
    device: Option<String>,
    current_song: Option<Track>,
    /// The last state reported by the external player
    player: PlaybackState,
    /// When the jam last started a song
    last_timestamp: Option<Instant>,
}

impl Tracking {
    /// The player is trusted once the settle time has passed since the jam started a song.
    fn is_settled(&self, settle_time: Duration) -> bool {
        self.last_timestamp
            .map(|t| t.elapsed() >= settle_time)
            .unwrap_or(true)
    }
}

/// The user-editable settings of a jam
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub name: String,
    pub active: bool,
    pub device: Option<String>,
}

/// A partial change to the settings of a jam. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub device: Option<String>,
}

/// A partial change to the external player. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackUpdate {
    pub playing: Option<bool>,
    pub device: Option<String>,
    pub volume: Option<u8>,
    pub seek_ms: Option<u64>,
}

impl JamSession {
    /// Creates a jam with `host` as its only member. The conductor is not running yet.
    pub fn new(label: &str, host: &str, provider: SharedProvider, config: &Config) -> Arc<Self> {
        let members = Members::default();
        members.add(host, &[Permission::Host]);

        let (stop, _) = watch::channel(false);

        Arc::new(Self {
            label: label.to_string(),
            host: host.to_string(),
            config: config.clone(),
            members,
            queue: RankedQueue::new(config),
            room: Room::new(label, config),
            provider,
            search: SearchCache::new(config.search_cache_ttl),
            tracking: AsyncMutex::new(Tracking {
                name: format!("Jam {}", label),
                ..Default::default()
            }),
            stop,
            conductor: Default::default(),
        })
    }

    /// Spawns the conductor. It holds only a weak reference, so it never keeps the jam alive.
    pub fn start(self: &Arc<Self>) {
        let mut conductor = self.conductor.lock();

        if conductor.is_some() || self.is_stopped() {
            return;
        }

        *conductor = Some(tokio::spawn(conductor::run(
            Arc::downgrade(self),
            self.stop.subscribe(),
            self.config.tick_interval,
        )));
    }

    /// Tears the jam down: deactivates it, stops the conductor, and closes the room.
    /// Resolves once the conductor has exited. Tearing down twice does nothing.
    pub async fn deconstruct(&self) {
        {
            let mut tracking = self.tracking.lock().await;

            if self.stop.send_replace(true) {
                return;
            }

            // A tick waiting on this lock sees the stop signal once it gets the lock
            tracking.active = false;
        }

        self.room.close().await;

        let handle = self.conductor.lock().take();

        if let Some(handle) = handle {
            let _ = handle.await;
        }

        info!("Jam {} torn down", self.label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Adds `identity` as a guest.
    pub fn join(&self, identity: &str) -> CollabResult<()> {
        self.ensure_open()?;

        if is_reserved_voter(identity) {
            return Err(CollabError::ReservedIdentity(identity.to_string()));
        }

        if !self.members.add(identity, &[Permission::Guest]) {
            return Err(CollabError::AlreadyMember(identity.to_string()));
        }

        info!("{} joined jam {}", identity, self.label);
        Ok(())
    }

    /// Removes `identity` from the jam. Removing the host is the caller's cue to tear the jam down.
    pub fn leave(&self, identity: &str) -> CollabResult<Member> {
        let member = self
            .members
            .remove(identity)
            .ok_or_else(|| CollabError::NotAMember(identity.to_string()))?;

        info!("{} left jam {}", identity, self.label);
        Ok(member)
    }

    pub fn member(&self, identity: &str) -> CollabResult<Member> {
        self.members
            .get(identity)
            .ok_or_else(|| CollabError::NotAMember(identity.to_string()))
    }

    /// Attaches a real-time subscriber to the room of this jam.
    pub fn connect(&self, identity: &str) -> CollabResult<Client> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Guest])?;

        Ok(self.room.register())
    }

    /// Toggles the vote of `identity` on a song, fetching its metadata if it isn't queued yet.
    /// Returns true if the member now votes for the song.
    pub async fn vote(&self, identity: &str, song_id: &str) -> CollabResult<bool> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Guest])?;

        let mut track = if self.queue.contains(song_id) {
            None
        } else {
            Some(self.provider.track(song_id).await?)
        };

        let _tracking = self.lock().await?;

        // The song may have been advanced or deleted while waiting for the lock
        if track.is_none() && !self.queue.contains(song_id) {
            track = Some(self.provider.track(song_id).await?);
        }

        let voted = match track {
            Some(track) => self.queue.vote(song_id, identity, track)?,
            None => self.queue.vote_existing(song_id, identity)?,
        };

        self.broadcast_queue();
        Ok(voted)
    }

    /// Removes a song regardless of its votes.
    pub async fn delete_song(&self, identity: &str, song_id: &str) -> CollabResult<Song> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        let _tracking = self.lock().await?;
        let song = self.queue.delete(song_id)?;

        self.broadcast_queue();
        Ok(song)
    }

    /// Queues every track of a playlist or album as a host-fill vote.
    /// Tracks the host fill already votes for are left alone. Returns how many were added.
    pub async fn add_collection(
        &self,
        identity: &str,
        kind: CollectionKind,
        id: &str,
    ) -> CollabResult<usize> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        let tracks = self.provider.collection_tracks(kind, id).await?;
        let _tracking = self.lock().await?;

        let mut added = 0;

        for track in tracks {
            if !track.is_identified_by(&track.id) {
                debug!("Skipping unplayable track {:?} in {}", track.name, id);
                continue;
            }

            if self.queue.has_vote(&track.id, HOST_VOTER) {
                continue;
            }

            let song_id = track.id.clone();
            self.queue.vote(&song_id, HOST_VOTER, track)?;

            added += 1;
        }

        info!("Added {} songs from {:?} {} to jam {}", added, kind, id, self.label);

        self.broadcast_queue();
        Ok(added)
    }

    /// Starts or stops driving playback from the queue.
    /// The flag only flips once the player confirmed the play or pause.
    pub async fn set_active(&self, identity: &str, active: bool) -> CollabResult<()> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        let mut tracking = self.lock().await?;
        self.apply_active(&mut tracking, active).await?;

        self.broadcast_jam(&tracking);
        Ok(())
    }

    /// Moves playback to `device_id` if the player isn't already on it.
    /// Returns true if playback was transferred.
    pub async fn set_device(&self, identity: &str, device_id: &str) -> CollabResult<bool> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        let mut tracking = self.lock().await?;
        let transferred = self.apply_device(&mut tracking, device_id).await?;

        self.broadcast_jam(&tracking);
        Ok(transferred)
    }

    pub async fn settings(&self) -> Settings {
        let tracking = self.tracking.lock().await;

        Settings {
            name: tracking.name.clone(),
            active: tracking.active,
            device: tracking.device.clone(),
        }
    }

    /// Applies the device first, then the active flag, then the name.
    /// If any step fails, the jam keeps the device and name it had before.
    pub async fn set_settings(
        &self,
        identity: &str,
        update: SettingsUpdate,
    ) -> CollabResult<Settings> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        {
            let mut tracking = self.lock().await?;
            let device = tracking.device.clone();

            if let Err(e) = self.apply_settings(&mut tracking, update).await {
                tracking.device = device;
                return Err(e);
            }

            self.broadcast_jam(&tracking);
        }

        Ok(self.settings().await)
    }

    /// The last player state observed by the conductor.
    pub async fn playback(&self) -> PlaybackState {
        self.tracking.lock().await.player.clone()
    }

    /// Changes the external player directly, without touching the active flag.
    /// If any step fails, the jam keeps the device it had before.
    pub async fn set_playback(
        &self,
        identity: &str,
        update: PlaybackUpdate,
    ) -> CollabResult<PlaybackState> {
        self.ensure_open()?;
        self.require(identity, &[Permission::Host])?;

        let mut tracking = self.lock().await?;
        let device = tracking.device.clone();

        let state = match self.apply_playback(&mut tracking, update).await {
            Ok(state) => state,
            Err(e) => {
                tracking.device = device;
                return Err(e);
            }
        };

        tracking.player = state.clone();

        self.room.broadcast(JamEvent::Playback(state.clone()).into());
        Ok(state)
    }

    pub async fn devices(&self, identity: &str) -> CollabResult<Vec<Device>> {
        self.require(identity, &[Permission::Host])?;
        Ok(self.provider.devices().await?)
    }

    /// The playlists of the host, to pick one for [JamSession::add_collection].
    pub async fn host_playlists(&self, identity: &str) -> CollabResult<Vec<Collection>> {
        self.require(identity, &[Permission::Host])?;
        Ok(self.provider.current_user_playlists().await?)
    }

    /// Creates a playlist on the host's account from the songs played so far.
    pub async fn export_history(&self, identity: &str, name: &str) -> CollabResult<Collection> {
        self.require(identity, &[Permission::Host])?;

        let track_ids: Vec<_> = self
            .queue
            .history_tracks()
            .into_iter()
            .map(|t| t.id)
            .collect();

        let description = format!("Played in jam {}", self.label);
        let playlist = self
            .provider
            .create_playlist(name, &description, &track_ids)
            .await?;

        info!(
            "Exported {} songs of jam {} to playlist {}",
            track_ids.len(),
            self.label,
            playlist.id
        );

        Ok(playlist)
    }

    pub async fn search(
        &self,
        identity: &str,
        query: &str,
        kind: SearchKind,
    ) -> CollabResult<SearchResults> {
        self.require(identity, &[Permission::Guest])?;
        Ok(self.search.search(self.provider.as_ref(), query, kind).await?)
    }

    /// The queue in ranking order, marking the songs `identity` votes for.
    pub async fn queue_for(&self, identity: &str) -> CollabResult<Vec<QueueEntry>> {
        self.require(identity, &[Permission::Guest])?;

        let _tracking = self.tracking.lock().await;
        Ok(self.queue.view_for(identity))
    }

    /// The played songs, oldest first, marking the songs `identity` voted for.
    pub async fn history_for(&self, identity: &str) -> CollabResult<Vec<QueueEntry>> {
        self.require(identity, &[Permission::Guest])?;

        let _tracking = self.tracking.lock().await;
        Ok(self.queue.history_for(identity))
    }

    pub async fn state(&self) -> JamState {
        let tracking = self.tracking.lock().await;
        self.jam_state(&tracking)
    }

    pub async fn summary(&self) -> JamSummary {
        JamSummary {
            state: self.state().await,
            members: self.members.len(),
            clients: self.room.client_count().await,
        }
    }

    fn ensure_open(&self) -> CollabResult<()> {
        if self.is_stopped() {
            return Err(CollabError::SessionClosed(self.label.clone()));
        }

        Ok(())
    }

    fn require(&self, identity: &str, required: &[Permission]) -> CollabResult<()> {
        let member = self.member(identity)?;

        if !member.has_permissions(required) {
            return Err(CollabError::PermissionDenied);
        }

        Ok(())
    }

    /// Takes the tracking lock, failing if the jam was torn down while waiting for it.
    async fn lock(&self) -> CollabResult<MutexGuard<'_, Tracking>> {
        let tracking = self.tracking.lock().await;
        self.ensure_open()?;

        Ok(tracking)
    }

    /// The name goes last, so it only changes once the player took everything else.
    async fn apply_settings(
        &self,
        tracking: &mut Tracking,
        update: SettingsUpdate,
    ) -> CollabResult<()> {
        if let Some(device) = &update.device {
            self.apply_device(tracking, device).await?;
        }

        if let Some(active) = update.active {
            if active != tracking.active {
                self.apply_active(tracking, active).await?;
            }
        }

        if let Some(name) = update.name {
            tracking.name = name;
        }

        Ok(())
    }

    async fn apply_playback(
        &self,
        tracking: &mut Tracking,
        update: PlaybackUpdate,
    ) -> CollabResult<PlaybackState> {
        if let Some(device) = &update.device {
            self.apply_device(tracking, device).await?;
        }

        if let Some(volume) = update.volume {
            self.provider.set_volume(volume.min(100)).await?;
        }

        if let Some(position) = update.seek_ms {
            self.provider.seek(position).await?;
        }

        match update.playing {
            Some(true) => self.provider.play(&[], tracking.device.as_deref()).await?,
            Some(false) => self.provider.pause().await?,
            None => {}
        }

        Ok(self.provider.current_playback().await?)
    }

    async fn apply_active(&self, tracking: &mut Tracking, active: bool) -> CollabResult<()> {
        if !active {
            self.provider.pause().await?;
            tracking.active = false;

            info!("Jam {} deactivated", self.label);
            return Ok(());
        }

        let state = self.provider.current_playback().await?;
        let resumable = tracking
            .current_song
            .as_ref()
            .is_some_and(|s| state.track_id() == Some(s.id.as_str()));

        if resumable {
            self.provider.play(&[], tracking.device.as_deref()).await?;
        } else {
            match self.queue.peek_next() {
                Ok(song) => self.start_song(tracking, &song).await?,
                // The conductor starts playing once something is queued
                Err(QueueError::Empty) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracking.active = true;

        info!("Jam {} activated", self.label);
        Ok(())
    }

    async fn apply_device(&self, tracking: &mut Tracking, device_id: &str) -> CollabResult<bool> {
        let state = self.provider.current_playback().await?;
        let transfer = state.device_id() != Some(device_id);

        if transfer {
            self.provider
                .transfer_playback(device_id, tracking.active)
                .await?;

            info!("Jam {} moved playback to device {}", self.label, device_id);
        }

        tracking.device = Some(device_id.to_string());
        Ok(transfer)
    }

    /// Plays `song`, which must be the head of the queue, then advances past it.
    /// Nothing changes if the player refuses.
    async fn start_song(&self, tracking: &mut Tracking, song: &Song) -> CollabResult<()> {
        let uris = [song.track().uri.clone()];
        self.provider.play(&uris, tracking.device.as_deref()).await?;

        let song = self.queue.advance()?;

        info!("Jam {} now playing {}", self.label, song.id());

        tracking.current_song = Some(song.track().clone());
        tracking.last_timestamp = Some(Instant::now());

        self.broadcast_queue();
        Ok(())
    }

    fn jam_state(&self, tracking: &Tracking) -> JamState {
        JamState {
            label: self.label.clone(),
            name: tracking.name.clone(),
            active: tracking.active,
            device: tracking.device.clone(),
            current_song: tracking.current_song.clone(),
        }
    }

    fn broadcast_queue(&self) {
        self.room.broadcast(JamEvent::Queue(self.queue.tracks()).into());
    }

    fn broadcast_jam(&self, tracking: &Tracking) {
        self.room
            .broadcast(JamEvent::Jam(self.jam_state(tracking)).into());
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::convert::Infallible;

    use futures::{
        channel::mpsc::{unbounded, UnboundedReceiver},
        stream, StreamExt,
    };
    use jam_core::{Frame, Introspect, Notification, NotificationKind, ProviderError};
    use jam_impls::{Catalog, SimulatedProvider};
    use serde_json::{json, Value};

    use super::*;

    pub(crate) fn catalog() -> Catalog {
        let mut catalog = Catalog::default();

        catalog.add_track(Track::mock("T1", 180_000));
        catalog.add_collection(
            CollectionKind::Playlist,
            "fill",
            "Fill",
            vec![Track::mock("H1", 180_000), Track::mock("H2", 180_000)],
        );

        catalog
    }

    pub(crate) fn jam_with(config: Config) -> (Arc<JamSession>, Arc<SimulatedProvider>) {
        let provider = Arc::new(SimulatedProvider::new(catalog()));
        let jam = JamSession::new("K3R7Z", "host", provider.clone(), &config);

        (jam, provider)
    }

    pub(crate) fn jam() -> (Arc<JamSession>, Arc<SimulatedProvider>) {
        jam_with(Config::immediate())
    }

    /// Attaches a subscriber that never sends anything and returns what it receives.
    pub(crate) fn subscribe(jam: &JamSession, identity: &str) -> UnboundedReceiver<Frame> {
        let client = jam.connect(identity).expect("member can connect");
        let (sink, frames) = unbounded();

        tokio::spawn(client.run(sink, stream::pending::<Result<Frame, Infallible>>()));
        frames
    }

    /// Collects the events a subscriber received up to now.
    pub(crate) async fn received(
        jam: &JamSession,
        frames: &mut UnboundedReceiver<Frame>,
    ) -> Vec<String> {
        jam.room
            .broadcast(Notification::new(NotificationKind::Jam, &"marker"));

        let mut events = vec![];

        while let Some(frame) = frames.next().await {
            let Frame::Text(text) = frame else {
                continue;
            };

            let value: Value = serde_json::from_str(&text).expect("notification is json");

            if value["message"] == json!("marker") {
                break;
            }

            events.push(value["event"].as_str().unwrap_or_default().to_string());
        }

        events
    }

    fn ids(entries: Vec<QueueEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.track.id).collect()
    }

    #[tokio::test]
    async fn test_voting_walkthrough() {
        let (jam, _) = jam();

        jam.join("guest-1").expect("first guest joins");
        jam.join("guest-2").expect("second guest joins");

        assert!(jam.vote("guest-1", "T1").await.expect("vote succeeds"), "voted");
        assert!(jam.vote("guest-2", "T1").await.expect("vote succeeds"), "voted");

        let queue = jam.queue_for("guest-1").await.expect("guest sees the queue");
        assert_eq!(queue.len(), 1, "still one song");
        assert_eq!(queue[0].votes, 2, "two votes");

        assert!(!jam.vote("guest-1", "T1").await.expect("vote succeeds"), "vote taken back");

        let added = jam
            .add_collection("host", CollectionKind::Playlist, "fill")
            .await
            .expect("host imports the playlist");

        assert_eq!(added, 2, "both tracks were added");

        let queue = jam.queue_for("guest-2").await.expect("guest sees the queue");
        assert_eq!(ids(queue.clone()), vec!["T1", "H1", "H2"], "guest pick ranks first");
        assert!(queue.iter().all(|e| e.votes == 1), "every song has one vote");
        assert!(queue[0].voted, "guest sees their vote");
        assert!(!queue[1].voted, "host fill is not the guest's vote");
    }

    #[tokio::test]
    async fn test_membership() {
        let (jam, _) = jam();

        jam.join("guest").expect("guest joins");

        assert_eq!(
            jam.join("guest"),
            Err(CollabError::AlreadyMember("guest".to_string())),
            "joining twice is rejected"
        );
        assert_eq!(
            jam.join("host"),
            Err(CollabError::AlreadyMember("host".to_string())),
            "host is already a member"
        );

        assert!(jam.member("host").expect("host is a member").is_host(), "host");

        let member = jam.leave("guest").expect("guest leaves");
        assert!(!member.is_host(), "guest was no host");

        assert_eq!(
            jam.leave("guest").map(|m| m.id),
            Err(CollabError::NotAMember("guest".to_string())),
            "leaving twice is rejected"
        );
    }

    #[tokio::test]
    async fn test_host_fill_voter_cant_join() {
        let (jam, _) = jam();

        jam.add_collection("host", CollectionKind::Playlist, "fill")
            .await
            .expect("host imports the playlist");

        assert_eq!(
            jam.join(HOST_VOTER),
            Err(CollabError::ReservedIdentity(HOST_VOTER.to_string())),
            "host fill voter is not a person"
        );
        assert_eq!(
            jam.vote(HOST_VOTER, "H1").await,
            Err(CollabError::NotAMember(HOST_VOTER.to_string())),
            "host fill votes can't be taken back"
        );
        assert_eq!(ids(jam.queue.tracks()), vec!["H1", "H2"], "host fill is intact");
    }

    #[tokio::test]
    async fn test_permissions() {
        let (jam, _) = jam();

        jam.join("guest").expect("guest joins");
        jam.vote("guest", "T1").await.expect("guests vote");

        assert_eq!(
            jam.delete_song("guest", "T1").await.map(|s| s.id().to_string()),
            Err(CollabError::PermissionDenied),
            "guests can't delete"
        );
        assert_eq!(
            jam.add_collection("guest", CollectionKind::Playlist, "fill").await,
            Err(CollabError::PermissionDenied),
            "guests can't import"
        );
        assert_eq!(
            jam.vote("stranger", "T1").await,
            Err(CollabError::NotAMember("stranger".to_string())),
            "strangers can't vote"
        );
        assert_eq!(
            jam.set_active("guest", true).await,
            Err(CollabError::PermissionDenied),
            "guests can't start playback"
        );

        assert_eq!(jam.queue.len(), 1, "rejected operations changed nothing");

        jam.delete_song("host", "T1").await.expect("host deletes");
        assert!(jam.queue.is_empty(), "song is gone");
    }

    #[tokio::test]
    async fn test_provider_failure_changes_nothing() {
        let (jam, provider) = jam();
        let failure = ProviderError::Unavailable("offline".to_string());

        provider.set_failure(Some(failure.clone()));

        assert_eq!(
            jam.vote("host", "T1").await,
            Err(CollabError::Provider(failure.clone())),
            "vote fails with the provider"
        );
        assert_eq!(
            jam.add_collection("host", CollectionKind::Playlist, "fill").await,
            Err(CollabError::Provider(failure.clone())),
            "import fails with the provider"
        );
        assert_eq!(
            jam.set_active("host", false).await,
            Err(CollabError::Provider(failure)),
            "pause fails with the provider"
        );

        assert!(jam.queue.is_empty(), "queue is untouched");

        provider.set_failure(None);

        assert_eq!(
            jam.vote("host", "missing").await,
            Err(CollabError::Provider(ProviderError::NotFound {
                resource: "track",
                id: "missing".to_string(),
            })),
            "unknown tracks can't be voted for"
        );
    }

    #[tokio::test]
    async fn test_reimport_keeps_votes() {
        let (jam, _) = jam();

        for expected in [2, 0] {
            let added = jam
                .add_collection("host", CollectionKind::Playlist, "fill")
                .await
                .expect("import succeeds");

            assert_eq!(added, expected, "only new songs are added");
        }

        assert_eq!(jam.queue.len(), 2, "second import did not take votes back");
    }

    #[tokio::test]
    async fn test_set_active() {
        let (jam, provider) = jam();

        jam.add_collection("host", CollectionKind::Playlist, "fill")
            .await
            .expect("import succeeds");

        jam.set_active("host", true).await.expect("jam activates");

        let state = jam.state().await;
        assert!(state.active, "jam is active");
        assert_eq!(
            state.current_song.map(|t| t.id).as_deref(),
            Some("H1"),
            "head of the queue plays"
        );
        assert_eq!(ids(jam.queue.tracks()), vec!["H2"], "queue advanced");
        assert_eq!(provider.introspect().plays, vec!["jam:track:H1"], "one play");

        jam.set_active("host", false).await.expect("jam deactivates");
        assert!(!provider.introspect().playing, "player paused");

        provider.deactivate_devices();

        assert_eq!(
            jam.set_active("host", true).await,
            Err(CollabError::Provider(ProviderError::DeviceNotActive)),
            "resuming the current song needs a device"
        );
        assert!(!jam.settings().await.active, "failed activation leaves the flag alone");
    }

    #[tokio::test]
    async fn test_set_device() {
        let (jam, provider) = jam();

        let transferred = jam
            .set_device("host", "sim-speaker")
            .await
            .expect("device is set");
        assert!(!transferred, "already on the speaker");

        let transferred = jam.set_device("host", "sim-phone").await.expect("device is set");
        assert!(transferred, "moved to the phone");

        assert_eq!(provider.introspect().transfers, vec!["sim-phone"], "one transfer");
        assert_eq!(
            jam.settings().await.device.as_deref(),
            Some("sim-phone"),
            "device is remembered"
        );
    }

    #[tokio::test]
    async fn test_settings() {
        let (jam, _) = jam();
        let mut frames = subscribe(&jam, "host");

        let settings = jam
            .set_settings(
                "host",
                SettingsUpdate {
                    name: Some("Friday".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("settings are updated");

        assert_eq!(
            settings,
            Settings {
                name: "Friday".to_string(),
                active: false,
                device: None,
            },
            "name changed"
        );

        assert_eq!(received(&jam, &mut frames).await, vec!["jam"], "jam state was pushed");
    }

    #[tokio::test]
    async fn test_set_playback() {
        let (jam, provider) = jam();
        provider.play_elsewhere("T1");

        let state = jam
            .set_playback(
                "host",
                PlaybackUpdate {
                    playing: Some(false),
                    volume: Some(120),
                    seek_ms: Some(30_000),
                    ..Default::default()
                },
            )
            .await
            .expect("playback is updated");

        assert!(!state.playing, "paused");
        assert_eq!(state.progress_ms, 30_000, "seeked");
        assert_eq!(provider.introspect().volume, Some(100), "volume is capped");
        assert_eq!(jam.playback().await, state, "state is cached");
        assert!(!jam.settings().await.active, "raw playback leaves the jam alone");
    }

    #[tokio::test]
    async fn test_failed_settings_keep_device() {
        let (jam, provider) = jam();
        let failure = ProviderError::Unavailable("offline".to_string());

        jam.vote("host", "T1").await.expect("vote succeeds");
        provider.fail_call("play", Some(failure.clone()));

        let result = jam
            .set_settings(
                "host",
                SettingsUpdate {
                    name: Some("Friday".to_string()),
                    active: Some(true),
                    device: Some("sim-phone".to_string()),
                },
            )
            .await;

        assert_eq!(result, Err(CollabError::Provider(failure)), "play failed");
        assert_eq!(provider.introspect().transfers, vec!["sim-phone"], "transfer went out");
        assert_eq!(
            jam.settings().await,
            Settings {
                name: "Jam K3R7Z".to_string(),
                active: false,
                device: None,
            },
            "settings are unchanged"
        );
        assert_eq!(ids(jam.queue.tracks()), vec!["T1"], "queue is unchanged");
    }

    #[tokio::test]
    async fn test_failed_playback_keeps_device() {
        let (jam, provider) = jam();
        let failure = ProviderError::Request("seek refused".to_string());

        jam.set_device("host", "sim-speaker")
            .await
            .expect("device is set");

        provider.play_elsewhere("T1");
        provider.fail_call("seek", Some(failure.clone()));

        let result = jam
            .set_playback(
                "host",
                PlaybackUpdate {
                    device: Some("sim-phone".to_string()),
                    seek_ms: Some(30_000),
                    ..Default::default()
                },
            )
            .await;

        assert_eq!(result, Err(CollabError::Provider(failure)), "seek failed");
        assert_eq!(
            jam.settings().await.device.as_deref(),
            Some("sim-speaker"),
            "device is unchanged"
        );
        assert_eq!(jam.playback().await, PlaybackState::default(), "no state was cached");
    }

    #[tokio::test]
    async fn test_vote_outlives_advance() {
        let (jam, _) = jam();

        jam.join("guest").expect("guest joins");
        jam.vote("host", "T1").await.expect("vote succeeds");

        let tracking = jam.tracking.lock().await;

        let vote = tokio::spawn({
            let jam = jam.clone();
            async move { jam.vote("guest", "T1").await }
        });

        // Let the vote see the queued song and wait for the lock
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }

        jam.queue.advance().expect("song is advanced");
        drop(tracking);

        let voted = vote.await.expect("vote task finishes");

        assert_eq!(voted, Ok(true), "song was queued again");
        assert_eq!(jam.queue.view_for("guest")[0].votes, 1, "only the guest votes");
    }

    #[tokio::test]
    async fn test_vote_broadcasts_queue() {
        let (jam, _) = jam();
        let mut frames = subscribe(&jam, "host");

        jam.vote("host", "T1").await.expect("vote succeeds");

        assert_eq!(
            received(&jam, &mut frames).await,
            vec!["queue"],
            "vote is pushed to subscribers"
        );
    }

    #[tokio::test]
    async fn test_export_history() {
        let (jam, provider) = jam();

        jam.vote("host", "T1").await.expect("vote succeeds");
        jam.set_active("host", true).await.expect("jam activates");

        let playlist = jam
            .export_history("host", "Friday")
            .await
            .expect("history is exported");

        assert_eq!(playlist.track_count, 1, "played song was exported");
        assert_eq!(provider.introspect().created_playlists, 1, "one playlist");

        let history = jam.history_for("host").await.expect("history is visible");
        assert!(history[0].voted, "host voted for the played song");
    }

    #[tokio::test]
    async fn test_deconstruct() {
        let (jam, _) = jam();
        let mut frames = subscribe(&jam, "host");

        jam.start();
        jam.deconstruct().await;

        assert!(jam.is_stopped(), "jam is stopped");
        assert!(!jam.settings().await.active, "jam is inactive");
        assert_eq!(
            jam.vote("host", "T1").await,
            Err(CollabError::SessionClosed("K3R7Z".to_string())),
            "closed jams reject operations"
        );

        let mut close = None;

        while let Some(frame) = frames.next().await {
            if let Frame::Text(text) = &frame {
                if *text == Notification::close().to_text() {
                    close = Some(frame);
                }
            }
        }

        assert!(close.is_some(), "subscriber was told about the close");

        // Tearing down again is harmless
        jam.deconstruct().await;
    }
}

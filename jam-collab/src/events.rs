use jam_core::{Notification, NotificationKind, PlaybackState, QueueEntry, Track};
use serde::Serialize;

/// Session-level state, as pushed to subscribers whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamState {
    pub label: String,
    pub name: String,
    /// Whether the jam is driving playback from its queue
    pub active: bool,
    pub device: Option<String>,
    pub current_song: Option<Track>,
}

/// A jam as listed by the registry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamSummary {
    #[serde(flatten)]
    pub state: JamState,
    pub members: usize,
    /// Connected real-time subscribers
    pub clients: usize,
}

/// Events emitted by a jam to its room.
#[derive(Debug, Clone)]
pub enum JamEvent {
    /// The queue was modified. Carries the anonymous view, since no single voter applies.
    Queue(Vec<QueueEntry>),
    /// The external player was polled
    Playback(PlaybackState),
    /// Name, active flag, device or current song changed
    Jam(JamState),
}

impl From<JamEvent> for Notification {
    fn from(event: JamEvent) -> Self {
        match event {
            JamEvent::Queue(entries) => Notification::new(NotificationKind::Queue, &entries),
            JamEvent::Playback(state) => Notification::new(NotificationKind::Playback, &state),
            JamEvent::Jam(state) => Notification::new(NotificationKind::Jam, &state),
        }
    }
}

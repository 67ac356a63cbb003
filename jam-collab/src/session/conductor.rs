use std::{sync::Weak, time::Duration};

use log::{debug, info, warn};
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};

use crate::JamEvent;

use super::JamSession;

/// Ticks the jam until it is stopped or dropped.
pub(super) async fn run(session: Weak<JamSession>, mut stop: watch::Receiver<bool>, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while !*stop.borrow() {
        tokio::select! {
            biased;
            // Also resolves if the jam went away
            _ = stop.changed() => break,
            _ = interval.tick() => {
                let Some(session) = session.upgrade() else {
                    break;
                };

                session.tick().await;
            }
        }
    }

    debug!("Conductor stopped");
}

impl JamSession {
    /// Polls the external player once and reconciles it with the queue.
    ///
    /// Errors from the player are logged and the tick is abandoned, the next tick retries.
    pub async fn tick(&self) {
        if self.is_stopped() {
            return;
        }

        let state = match self.provider.current_playback().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Jam {} could not fetch playback: {}", self.label, e);
                return;
            }
        };

        let mut tracking = self.tracking.lock().await;

        if self.is_stopped() {
            return;
        }

        let settled = tracking.is_settled(self.config.advance_settle_time);

        let diverged = tracking
            .current_song
            .as_ref()
            .is_some_and(|song| state.track_id() != Some(song.id.as_str()));

        if settled && diverged {
            info!(
                "Playback of jam {} was changed externally, deactivating",
                self.label
            );

            tracking.active = false;
            tracking.current_song = None;

            self.broadcast_jam(&tracking);
        }

        tracking.player = state.clone();
        self.room.broadcast(JamEvent::Playback(state.clone()).into());

        if !tracking.active || !settled {
            return;
        }

        let finishing = state.is_stalled() || self.config.is_near_end(state.progress_ms, state.duration_ms());

        if !finishing {
            return;
        }

        // An empty queue just means there is nothing to advance to yet
        let Ok(song) = self.queue.peek_next() else {
            return;
        };

        if let Err(e) = self.start_song(&mut tracking, &song).await {
            warn!("Jam {} could not play {}: {}", self.label, song.id(), e);
            return;
        }

        self.broadcast_jam(&tracking);
    }
}

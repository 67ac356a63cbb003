mod error;
mod events;
mod members;
mod registry;
mod search;
mod session;
mod util;

use std::sync::Arc;

use dashmap::DashMap;

pub use error::*;
pub use events::*;
pub use members::*;
pub use registry::*;
pub use search::*;
pub use session::*;
pub use util::*;

use jam_core::{Config, ProviderConnector};

// Reduces verbosity
type Store<K, T> = Arc<DashMap<K, Arc<T>>>;

/// The jam system, facilitating session management, voting, and playback synchronization.
pub struct Collab {
    context: CollabContext,

    pub sessions: SessionManager,
}

/// A type passed to various components of the jam system, to access shared state.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Config,
    pub connector: Arc<dyn ProviderConnector>,

    /// Live jams by label
    pub sessions: Store<String, JamSession>,
}

impl Collab {
    pub fn new(config: Config, connector: Arc<dyn ProviderConnector>) -> Self {
        let context = CollabContext {
            config,
            connector,
            sessions: Default::default(),
        };

        let sessions = SessionManager::new(&context);

        Self { context, sessions }
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Tears down every live jam.
    pub async fn shutdown(&self) {
        let labels: Vec<_> = self
            .context
            .sessions
            .iter()
            .map(|s| s.key().clone())
            .collect();

        for label in labels {
            // A jam deleted concurrently is already gone
            let _ = self.sessions.delete(&label).await;
        }
    }
}

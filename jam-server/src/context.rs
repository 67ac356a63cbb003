use std::sync::Arc;

use axum::extract::FromRef;
use jam_collab::{Collab, JamSession};

use crate::errors::ServerResult;

/// State shared by every handler.
#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}

impl ServerContext {
    /// Finds the live jam behind a label from the path.
    pub fn session(&self, label: &str) -> ServerResult<Arc<JamSession>> {
        Ok(self.collab.sessions.get(label)?)
    }
}

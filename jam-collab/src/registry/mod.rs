use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use jam_core::is_reserved_voter;
use log::{debug, error, info};

use crate::{
    normalize_label, random_label, CollabContext, CollabError, CollabResult, JamSession,
    JamSummary,
};

/// Creates, finds and tears down jams by label.
pub struct SessionManager {
    context: CollabContext,
}

impl SessionManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Binds `host` to a provider and creates a jam for them under a fresh label.
    ///
    /// The label is reserved and the jam inserted in one step, so concurrent
    /// creations can never end up with the same label.
    pub async fn create(&self, host: &str) -> CollabResult<Arc<JamSession>> {
        if is_reserved_voter(host) {
            return Err(CollabError::ReservedIdentity(host.to_string()));
        }

        let config = &self.context.config;
        let provider = self.context.connector.connect(host).await?;

        for attempt in 1..=config.label_retries {
            let label = random_label(config.label_length);

            match self.context.sessions.entry(label.clone()) {
                Entry::Occupied(_) => {
                    debug!("Label {} is taken, attempt {}", label, attempt);
                }
                Entry::Vacant(entry) => {
                    let session = JamSession::new(&label, host, provider.clone(), config);
                    entry.insert(session.clone());

                    session.start();
                    info!("{} created jam {}", host, label);

                    return Ok(session);
                }
            }
        }

        error!(
            "No free label after {} attempts, {} jams are live",
            config.label_retries,
            self.context.sessions.len()
        );

        Err(CollabError::LabelExhaustion {
            attempts: config.label_retries,
        })
    }

    /// Looks up a jam. Labels are case-insensitive.
    pub fn get(&self, label: &str) -> CollabResult<Arc<JamSession>> {
        let label = normalize_label(label);

        self.context
            .sessions
            .get(&label)
            .map(|s| s.clone())
            .ok_or(CollabError::NotFound(label))
    }

    /// Tears a jam down, then frees its label.
    pub async fn delete(&self, label: &str) -> CollabResult<()> {
        let session = self.get(label)?;
        session.deconstruct().await;

        self.context.sessions.remove(session.label());
        info!("Jam {} deleted", session.label());

        Ok(())
    }

    pub fn join(&self, label: &str, identity: &str) -> CollabResult<Arc<JamSession>> {
        let session = self.get(label)?;
        session.join(identity)?;

        Ok(session)
    }

    /// Removes `identity` from a jam. The jam is deleted if its host leaves.
    pub async fn leave(&self, label: &str, identity: &str) -> CollabResult<()> {
        let session = self.get(label)?;
        let member = session.leave(identity)?;

        if member.is_host() {
            self.delete(session.label()).await?;
        }

        Ok(())
    }

    pub async fn list(&self) -> Vec<JamSummary> {
        let sessions: Vec<_> = self
            .context
            .sessions
            .iter()
            .map(|s| s.value().clone())
            .collect();

        let mut summaries = vec![];

        for session in sessions {
            summaries.push(session.summary().await);
        }

        summaries.sort_by(|a, b| a.state.label.cmp(&b.state.label));
        summaries
    }
}

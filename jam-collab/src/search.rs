use std::time::Duration;

use dashmap::DashMap;
use jam_core::{PlaybackProvider, ProviderResult, SearchKind, SearchResults};
use log::debug;
use tokio::time::Instant;

/// Caches provider search results per kind and normalized query.
pub struct SearchCache {
    ttl: Option<Duration>,
    entries: DashMap<(SearchKind, String), (Instant, SearchResults)>,
}

impl SearchCache {
    /// A `ttl` of `None` disables caching.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Default::default(),
        }
    }

    pub async fn search(
        &self,
        provider: &dyn PlaybackProvider,
        query: &str,
        kind: SearchKind,
    ) -> ProviderResult<SearchResults> {
        let query = query.trim().to_lowercase();

        if query.is_empty() {
            return Ok(SearchResults::default());
        }

        let Some(ttl) = self.ttl else {
            return provider.search(&query, kind).await;
        };

        let key = (kind, query);

        if let Some(entry) = self.entries.get(&key) {
            let (stored_at, results) = entry.value();

            if stored_at.elapsed() < ttl {
                debug!("Search cache hit for {:?} {}", key.0, key.1);
                return Ok(results.clone());
            }
        }

        let results = provider.search(&key.1, kind).await?;

        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        self.entries.insert(key, (Instant::now(), results.clone()));

        Ok(results)
    }
}

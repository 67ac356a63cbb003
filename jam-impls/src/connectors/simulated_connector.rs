use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use jam_core::{ProviderConnector, ProviderResult, SharedProvider};
use log::info;

use crate::{Catalog, SimulatedProvider};

/// Gives every host their own [SimulatedProvider] over a copy of the same catalog.
/// Connecting the same host again returns the same provider.
pub struct SimulatedConnector {
    catalog: Catalog,
    providers: DashMap<String, Arc<SimulatedProvider>>,
}

impl SimulatedConnector {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            providers: Default::default(),
        }
    }

    /// The provider handed out for `host`, if they connected before.
    pub fn provider_for(&self, host: &str) -> Option<Arc<SimulatedProvider>> {
        self.providers.get(host).map(|p| p.clone())
    }
}

#[async_trait]
impl ProviderConnector for SimulatedConnector {
    async fn connect(&self, host: &str) -> ProviderResult<SharedProvider> {
        let provider = self
            .providers
            .entry(host.to_string())
            .or_insert_with(|| {
                info!("Connecting {} to a simulated player", host);
                Arc::new(SimulatedProvider::new(self.catalog.clone()))
            })
            .clone();

        let provider: SharedProvider = provider;
        Ok(provider)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_connect_is_per_host() {
        let connector = SimulatedConnector::new(Catalog::demo());

        connector.connect("alice").await.expect("alice connects");
        connector.connect("alice").await.expect("alice connects again");

        assert!(connector.provider_for("alice").is_some(), "alice has a provider");
        assert!(connector.provider_for("bob").is_none(), "bob never connected");
        assert_eq!(connector.providers.len(), 1, "reconnecting reuses the provider");
    }
}

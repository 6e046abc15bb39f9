use std::sync::Arc;

use super::Metrics;
use crate::adapters::{CurrencyLedger, Transport};
use crate::catalog::Catalog;
use crate::config::{MarketConfig, SpawnConfig};
use crate::deck::DeckManager;
use crate::market::Marketplace;
use crate::ownership::OwnershipLedger;
use crate::spawn::SpawnEngine;
use crate::store::DocumentStore;

/// Process-wide engine components shared by every tenant.
///
/// Catalog, scarcity, ownership and market data are global; only the open-spawn
/// table, enabled chats, timer and roles are per tenant.
pub struct CardServices {
    pub catalog: Arc<Catalog>,
    pub store: Arc<dyn DocumentStore>,
    pub transport: Arc<dyn Transport>,
    pub ledger: Arc<dyn CurrencyLedger>,
    pub metrics: Arc<Metrics>,
    pub engine: Arc<SpawnEngine>,
    pub ownership: OwnershipLedger,
    pub market: Marketplace,
    pub decks: DeckManager,
}

impl CardServices {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn Transport>,
        ledger: Arc<dyn CurrencyLedger>,
        spawn: SpawnConfig,
        market: MarketConfig,
    ) -> Arc<Self> {
        let metrics = Arc::new(Metrics::new());
        let engine = Arc::new(SpawnEngine::new(
            catalog.clone(),
            store.clone(),
            transport.clone(),
            metrics.clone(),
            spawn,
        ));

        Arc::new(Self {
            ownership: OwnershipLedger::new(store.clone(), catalog.clone(), metrics.clone()),
            market: Marketplace::new(
                store.clone(),
                ledger.clone(),
                catalog.clone(),
                metrics.clone(),
                market,
            ),
            decks: DeckManager::new(store.clone(), catalog.clone()),
            engine,
            catalog,
            store,
            transport,
            ledger,
            metrics,
        })
    }
}

pub mod adapters;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod deck;
pub mod domain;
pub mod error;
pub mod logging;
pub mod market;
pub mod ownership;
pub mod pricing;
pub mod services;
pub mod spawn;
pub mod store;
pub mod tenant;

pub use adapters::{CurrencyLedger, LogTransport, MemoryLedger, RecordingTransport, Transport};
pub use catalog::Catalog;
pub use config::AppConfig;
pub use deck::DeckManager;
pub use error::{CardError, Result};
pub use market::Marketplace;
pub use ownership::OwnershipLedger;
pub use pricing::{price_of, rarity_of, Rarity};
pub use services::{CardServices, Metrics};
pub use spawn::{OpenSpawnTable, SpawnEngine, SpawnOutcome, SpawnRequest};
pub use store::{DocumentStore, MemoryStore, PostgresStore};
pub use tenant::{Caller, Role, TenantRegistry, TenantRuntime};

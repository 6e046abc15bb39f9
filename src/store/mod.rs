//! Document store abstraction over scarcity records, owned copies, market
//! listings and custom decks.
//!
//! Operations that guard an invariant (`reserve_copy`, `record_claim`,
//! `adjust_circulation`) are single calls so each backend can make them atomic.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{CustomDeck, ListingKind, MarketListing, OwnedCopy, ScarcityRecord};
use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ==================== Scarcity ====================

    async fn get_scarcity(&self, collectible_id: &str) -> Result<Option<ScarcityRecord>>;

    /// Fetch the record, creating it with `max_copies` if it does not exist yet
    async fn ensure_scarcity(&self, collectible_id: &str, max_copies: u32)
        -> Result<ScarcityRecord>;

    /// Atomically bump `total_spawned` if under the cap (or if `bypass_cap`).
    /// Returns the reserved copy number, or `None` when the cap is reached.
    async fn reserve_copy(
        &self,
        collectible_id: &str,
        bypass_cap: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>>;

    /// Undo the reservation of `copy_number` after a failed publish. Returns
    /// false when a later reservation already happened and the number stays consumed.
    async fn release_copy(&self, collectible_id: &str, copy_number: u32) -> Result<bool>;

    /// Count a claim: one more owner and one more copy in circulation
    async fn record_claim(&self, collectible_id: &str) -> Result<()>;

    /// Add `delta` to circulation, flooring at zero
    async fn adjust_circulation(&self, collectible_id: &str, delta: i64) -> Result<()>;

    async fn record_trade(&self, collectible_id: &str, price: u64, keep: usize) -> Result<()>;

    // ==================== Owned copies ====================

    async fn insert_copy(&self, copy: &OwnedCopy) -> Result<()>;

    async fn get_copy(&self, id: Uuid) -> Result<Option<OwnedCopy>>;

    async fn update_copy(&self, copy: &OwnedCopy) -> Result<()>;

    async fn delete_copy(&self, id: Uuid) -> Result<()>;

    /// Every copy owned by `owner`, oldest acquisition first
    async fn copies_by_owner(&self, owner: &str) -> Result<Vec<OwnedCopy>>;

    /// Owner -> copy count for every owner holding at least one copy
    async fn owner_counts(&self) -> Result<Vec<(String, u64)>>;

    // ==================== Listings ====================

    async fn insert_listing(&self, listing: &MarketListing) -> Result<()>;

    async fn update_listing(&self, listing: &MarketListing) -> Result<()>;

    async fn active_listings(&self, kind: ListingKind) -> Result<Vec<MarketListing>>;

    // ==================== Custom decks ====================

    async fn insert_deck(&self, deck: &CustomDeck) -> Result<()>;

    async fn update_deck(&self, deck: &CustomDeck) -> Result<()>;

    async fn delete_deck(&self, id: Uuid) -> Result<()>;

    async fn get_deck(&self, id: Uuid) -> Result<Option<CustomDeck>>;

    async fn decks_by_owner(&self, owner: &str) -> Result<Vec<CustomDeck>>;
}

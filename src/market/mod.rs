//! Player marketplace: fixed-price sales and a single English auction.
//!
//! Every mutation runs under one async gate, so listing, buying, bidding and
//! settlement never interleave.

pub mod auction;
pub mod sale;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::adapters::CurrencyLedger;
use crate::catalog::Catalog;
use crate::config::MarketConfig;
use crate::domain::{ListingStatus, MarketListing, OwnedCopy, MAIN_DECK_SLOTS};
use crate::error::{CardError, Result};
use crate::ownership::transfer_copy;
use crate::services::Metrics;
use crate::store::DocumentStore;

pub use auction::AuctionResult;
pub use sale::Purchase;

pub struct Marketplace {
    store: Arc<dyn DocumentStore>,
    ledger: Arc<dyn CurrencyLedger>,
    catalog: Arc<Catalog>,
    metrics: Arc<Metrics>,
    config: MarketConfig,
    gate: Mutex<()>,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        ledger: Arc<dyn CurrencyLedger>,
        catalog: Arc<Catalog>,
        metrics: Arc<Metrics>,
        config: MarketConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
            metrics,
            config,
            gate: Mutex::new(()),
        }
    }

    /// The copy in the owner's main-deck slot
    async fn copy_in_slot(&self, owner: &str, slot: u8) -> Result<OwnedCopy> {
        if slot == 0 || slot > MAIN_DECK_SLOTS {
            return Err(CardError::InvalidInput(format!(
                "deck slot must be between 1 and {}",
                MAIN_DECK_SLOTS
            )));
        }
        self.store
            .copies_by_owner(owner)
            .await?
            .into_iter()
            .find(|c| c.deck_slot == Some(slot))
            .ok_or_else(|| CardError::NotFound(format!("card in deck slot {}", slot)))
    }

    /// Pay the seller and hand the copy to the buyer.
    ///
    /// The listing is stored as sold before any coins move, so a retry after a
    /// partial failure never charges twice. A failed payment reopens the
    /// listing; a failed delivery reverses the payment and cancels it.
    async fn settle_trade(
        &self,
        listing: &mut MarketListing,
        copy: &mut OwnedCopy,
        buyer: &str,
        price: u64,
    ) -> Result<()> {
        let name = self
            .catalog
            .get(&listing.collectible_id)
            .map(|c| c.name.as_str())
            .unwrap_or(listing.collectible_id.as_str());
        let memo = format!("{} #{}", name, copy.copy_number);

        let reopen_as = listing.status;
        listing.status = ListingStatus::Sold;
        self.store.update_listing(listing).await?;

        if let Err(e) = self.collect_payment(&listing.seller, buyer, price, &memo).await {
            listing.status = reopen_as;
            if let Err(write) = self.store.update_listing(listing).await {
                error!(listing = %listing.id, "Could not reopen listing: {}", write);
            }
            return Err(e);
        }

        if let Err(e) = transfer_copy(self.store.as_ref(), copy, buyer).await {
            error!(listing = %listing.id, "Paid trade of {} not delivered: {}", memo, e);
            self.reverse_payment(&listing.seller, buyer, price, &memo).await;
            listing.status = ListingStatus::Cancelled;
            if let Err(write) = self.store.update_listing(listing).await {
                error!(listing = %listing.id, "Could not cancel listing: {}", write);
            }
            if let Err(write) = self.unflag(listing).await {
                warn!(listing = %listing.id, "Could not clear sale flag: {}", write);
            }
            return Err(e);
        }

        // the card has moved; a lost price sample does not undo the trade
        if let Err(e) = self
            .store
            .record_trade(&listing.collectible_id, price, self.config.max_recent_trades)
            .await
        {
            warn!("Trade price of {} not recorded: {}", memo, e);
        }
        Metrics::inc(&self.metrics.trades);

        info!(
            seller = %listing.seller,
            buyer,
            "Traded {} for {} coins",
            memo,
            price
        );
        Ok(())
    }

    /// Debit the buyer, then credit the seller. A failed credit refunds the buyer.
    async fn collect_payment(&self, seller: &str, buyer: &str, price: u64, memo: &str) -> Result<()> {
        self.ledger.debit(buyer, price, &format!("buy {}", memo)).await?;
        if let Err(e) = self
            .ledger
            .credit(seller, price, &format!("sold {}", memo))
            .await
        {
            self.ledger.credit(buyer, price, "refund").await?;
            return Err(e);
        }
        Ok(())
    }

    /// Best-effort undo of a collected payment
    async fn reverse_payment(&self, seller: &str, buyer: &str, price: u64, memo: &str) {
        if let Err(e) = self
            .ledger
            .debit(seller, price, &format!("reversal {}", memo))
            .await
        {
            error!(seller, buyer, "Payment for {} could not be reversed: {}", memo, e);
            return;
        }
        if let Err(e) = self
            .ledger
            .credit(buyer, price, &format!("refund {}", memo))
            .await
        {
            error!(seller, buyer, "Refund for {} failed after reversal: {}", memo, e);
        }
    }

    /// Clear the sale flag on a listing's copy, if the copy still exists
    async fn unflag(&self, listing: &MarketListing) -> Result<()> {
        if let Some(mut copy) = self.store.get_copy(listing.copy_id).await? {
            copy.clear_sale();
            self.store.update_copy(&copy).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::MemoryLedger;
    use crate::catalog::tests::card;
    use crate::domain::Tier;
    use crate::domain::{CustomDeck, ListingKind, ScarcityRecord};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    /// Memory store that fails `update_copy` while the flag is set
    pub(crate) struct FlakyStore {
        inner: Arc<MemoryStore>,
        fail_copy_updates: AtomicBool,
    }

    impl FlakyStore {
        pub(crate) fn set_failing(&self, failing: bool) {
            self.fail_copy_updates.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get_scarcity(&self, id: &str) -> Result<Option<ScarcityRecord>> {
            self.inner.get_scarcity(id).await
        }
        async fn ensure_scarcity(&self, id: &str, max_copies: u32) -> Result<ScarcityRecord> {
            self.inner.ensure_scarcity(id, max_copies).await
        }
        async fn reserve_copy(&self, id: &str, bypass: bool, now: DateTime<Utc>) -> Result<Option<u32>> {
            self.inner.reserve_copy(id, bypass, now).await
        }
        async fn release_copy(&self, id: &str, copy_number: u32) -> Result<bool> {
            self.inner.release_copy(id, copy_number).await
        }
        async fn record_claim(&self, id: &str) -> Result<()> {
            self.inner.record_claim(id).await
        }
        async fn adjust_circulation(&self, id: &str, delta: i64) -> Result<()> {
            self.inner.adjust_circulation(id, delta).await
        }
        async fn record_trade(&self, id: &str, price: u64, keep: usize) -> Result<()> {
            self.inner.record_trade(id, price, keep).await
        }
        async fn insert_copy(&self, copy: &OwnedCopy) -> Result<()> {
            self.inner.insert_copy(copy).await
        }
        async fn get_copy(&self, id: Uuid) -> Result<Option<OwnedCopy>> {
            self.inner.get_copy(id).await
        }
        async fn update_copy(&self, copy: &OwnedCopy) -> Result<()> {
            if self.fail_copy_updates.load(Ordering::SeqCst) {
                return Err(CardError::Internal("copy write rejected".into()));
            }
            self.inner.update_copy(copy).await
        }
        async fn delete_copy(&self, id: Uuid) -> Result<()> {
            self.inner.delete_copy(id).await
        }
        async fn copies_by_owner(&self, owner: &str) -> Result<Vec<OwnedCopy>> {
            self.inner.copies_by_owner(owner).await
        }
        async fn owner_counts(&self) -> Result<Vec<(String, u64)>> {
            self.inner.owner_counts().await
        }
        async fn insert_listing(&self, listing: &MarketListing) -> Result<()> {
            self.inner.insert_listing(listing).await
        }
        async fn update_listing(&self, listing: &MarketListing) -> Result<()> {
            self.inner.update_listing(listing).await
        }
        async fn active_listings(&self, kind: ListingKind) -> Result<Vec<MarketListing>> {
            self.inner.active_listings(kind).await
        }
        async fn insert_deck(&self, deck: &CustomDeck) -> Result<()> {
            self.inner.insert_deck(deck).await
        }
        async fn update_deck(&self, deck: &CustomDeck) -> Result<()> {
            self.inner.update_deck(deck).await
        }
        async fn delete_deck(&self, id: Uuid) -> Result<()> {
            self.inner.delete_deck(id).await
        }
        async fn get_deck(&self, id: Uuid) -> Result<Option<CustomDeck>> {
            self.inner.get_deck(id).await
        }
        async fn decks_by_owner(&self, owner: &str) -> Result<Vec<CustomDeck>> {
            self.inner.decks_by_owner(owner).await
        }
    }

    pub(crate) struct Fixture {
        pub store: Arc<MemoryStore>,
        pub ledger: Arc<MemoryLedger>,
        pub market: Marketplace,
    }

    pub(crate) fn fixture(balances: &[(&str, u64)]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        fixture_over(balances, store.clone(), store)
    }

    /// Fixture whose marketplace writes through a store that can be told to
    /// reject copy updates
    pub(crate) fn flaky_fixture(balances: &[(&str, u64)]) -> (Fixture, Arc<FlakyStore>) {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore {
            inner: store.clone(),
            fail_copy_updates: AtomicBool::new(false),
        });
        (fixture_over(balances, store, flaky.clone()), flaky)
    }

    fn fixture_over(
        balances: &[(&str, u64)],
        store: Arc<MemoryStore>,
        backend: Arc<dyn DocumentStore>,
    ) -> Fixture {
        let ledger = Arc::new(MemoryLedger::with_balances(
            balances.iter().map(|(u, b)| (u.to_string(), *b)),
        ));
        let catalog = Arc::new(Catalog::from_entries(vec![
            card("1-00001", Tier::One, "Acorn Sprite", "Forest"),
            card("3-00002", Tier::Three, "Copper Owl", "Clockwork"),
        ]));
        let market = Marketplace::new(
            backend,
            ledger.clone(),
            catalog,
            Arc::new(Metrics::new()),
            MarketConfig::default(),
        );
        Fixture {
            store,
            ledger,
            market,
        }
    }

    /// Put a freshly minted copy into the owner's main deck
    pub(crate) async fn slotted(f: &Fixture, owner: &str, id: &str, n: u32, slot: u8) -> OwnedCopy {
        f.store.ensure_scarcity(id, 100).await.unwrap();
        f.store.reserve_copy(id, false, Utc::now()).await.unwrap();
        f.store.record_claim(id).await.unwrap();
        let mut copy = OwnedCopy::mint(owner, id, n, Utc::now());
        copy.deck_slot = Some(slot);
        f.store.insert_copy(&copy).await.unwrap();
        copy
    }

    #[tokio::test]
    async fn test_slot_bounds() {
        let f = fixture(&[]);
        assert!(matches!(
            f.market.copy_in_slot("alice", 0).await,
            Err(CardError::InvalidInput(_))
        ));
        assert!(matches!(
            f.market.copy_in_slot("alice", 13).await,
            Err(CardError::InvalidInput(_))
        ));
        assert!(matches!(
            f.market.copy_in_slot("alice", 4).await,
            Err(CardError::NotFound(_))
        ));
    }
}

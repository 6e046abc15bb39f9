use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::DocumentStore;
use crate::domain::{CustomDeck, ListingKind, MarketListing, OwnedCopy, ScarcityRecord};
use crate::error::{CardError, Result};

#[derive(Default)]
struct Collections {
    scarcity: HashMap<String, ScarcityRecord>,
    copies: HashMap<Uuid, OwnedCopy>,
    listings: HashMap<Uuid, MarketListing>,
    decks: HashMap<Uuid, CustomDeck>,
}

/// Process-local store. Every call holds the write lock for its whole body,
/// which makes the invariant-guarding operations atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of copies currently stored (all owners)
    pub async fn copy_count(&self) -> usize {
        self.inner.read().await.copies.len()
    }
}

fn missing_scarcity(collectible_id: &str) -> CardError {
    CardError::NotFound(format!("scarcity record for {}", collectible_id))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_scarcity(&self, collectible_id: &str) -> Result<Option<ScarcityRecord>> {
        Ok(self.inner.read().await.scarcity.get(collectible_id).cloned())
    }

    async fn ensure_scarcity(
        &self,
        collectible_id: &str,
        max_copies: u32,
    ) -> Result<ScarcityRecord> {
        let mut inner = self.inner.write().await;
        let record = inner
            .scarcity
            .entry(collectible_id.to_string())
            .or_insert_with(|| ScarcityRecord::new(collectible_id, max_copies));
        Ok(record.clone())
    }

    async fn reserve_copy(
        &self,
        collectible_id: &str,
        bypass_cap: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        let mut inner = self.inner.write().await;
        let record = inner
            .scarcity
            .get_mut(collectible_id)
            .ok_or_else(|| missing_scarcity(collectible_id))?;
        Ok(record.reserve(bypass_cap, now))
    }

    async fn release_copy(&self, collectible_id: &str, copy_number: u32) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let record = inner
            .scarcity
            .get_mut(collectible_id)
            .ok_or_else(|| missing_scarcity(collectible_id))?;
        Ok(record.release(copy_number))
    }

    async fn record_claim(&self, collectible_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .scarcity
            .get_mut(collectible_id)
            .ok_or_else(|| missing_scarcity(collectible_id))?;
        record.record_claim();
        Ok(())
    }

    async fn adjust_circulation(&self, collectible_id: &str, delta: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.scarcity.get_mut(collectible_id) {
            record.adjust_circulation(delta);
        }
        Ok(())
    }

    async fn record_trade(&self, collectible_id: &str, price: u64, keep: usize) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.scarcity.get_mut(collectible_id) {
            record.record_trade(price, keep);
        }
        Ok(())
    }

    async fn insert_copy(&self, copy: &OwnedCopy) -> Result<()> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.copies.values().any(|c| {
            c.collectible_id == copy.collectible_id && c.copy_number == copy.copy_number
        });
        if duplicate {
            return Err(CardError::AlreadyExists(format!(
                "copy #{} of {}",
                copy.copy_number, copy.collectible_id
            )));
        }
        inner.copies.insert(copy.id, copy.clone());
        Ok(())
    }

    async fn get_copy(&self, id: Uuid) -> Result<Option<OwnedCopy>> {
        Ok(self.inner.read().await.copies.get(&id).cloned())
    }

    async fn update_copy(&self, copy: &OwnedCopy) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.copies.get_mut(&copy.id) {
            Some(existing) => {
                *existing = copy.clone();
                Ok(())
            }
            None => Err(CardError::NotFound(format!("copy {}", copy.id))),
        }
    }

    async fn delete_copy(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.copies.remove(&id);
        Ok(())
    }

    async fn copies_by_owner(&self, owner: &str) -> Result<Vec<OwnedCopy>> {
        let inner = self.inner.read().await;
        let mut copies: Vec<OwnedCopy> = inner
            .copies
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect();
        copies.sort_by(|a, b| {
            a.acquired_at
                .cmp(&b.acquired_at)
                .then_with(|| a.copy_number.cmp(&b.copy_number))
        });
        Ok(copies)
    }

    async fn owner_counts(&self) -> Result<Vec<(String, u64)>> {
        let inner = self.inner.read().await;
        let mut counts: HashMap<String, u64> = HashMap::new();
        for copy in inner.copies.values() {
            *counts.entry(copy.owner.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn insert_listing(&self, listing: &MarketListing) -> Result<()> {
        self.inner
            .write()
            .await
            .listings
            .insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_listing(&self, listing: &MarketListing) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.listings.get_mut(&listing.id) {
            Some(existing) => {
                *existing = listing.clone();
                Ok(())
            }
            None => Err(CardError::NotFound(format!("listing {}", listing.id))),
        }
    }

    async fn active_listings(&self, kind: ListingKind) -> Result<Vec<MarketListing>> {
        let inner = self.inner.read().await;
        let mut listings: Vec<MarketListing> = inner
            .listings
            .values()
            .filter(|l| l.kind == kind && l.is_active())
            .cloned()
            .collect();
        listings.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(listings)
    }

    async fn insert_deck(&self, deck: &CustomDeck) -> Result<()> {
        self.inner.write().await.decks.insert(deck.id, deck.clone());
        Ok(())
    }

    async fn update_deck(&self, deck: &CustomDeck) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.decks.get_mut(&deck.id) {
            Some(existing) => {
                *existing = deck.clone();
                Ok(())
            }
            None => Err(CardError::NotFound(format!("deck {}", deck.name))),
        }
    }

    async fn delete_deck(&self, id: Uuid) -> Result<()> {
        self.inner.write().await.decks.remove(&id);
        Ok(())
    }

    async fn get_deck(&self, id: Uuid) -> Result<Option<CustomDeck>> {
        Ok(self.inner.read().await.decks.get(&id).cloned())
    }

    async fn decks_by_owner(&self, owner: &str) -> Result<Vec<CustomDeck>> {
        let inner = self.inner.read().await;
        let mut decks: Vec<CustomDeck> = inner
            .decks
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        decks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(decks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_reserve_is_atomic_under_contention() {
        let store = Arc::new(MemoryStore::new());
        store.ensure_scarcity("5-00001", 30).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.reserve_copy("5-00001", false, Utc::now()).await.unwrap()
            }));
        }

        let mut reserved = Vec::new();
        for handle in handles {
            if let Some(n) = handle.await.unwrap() {
                reserved.push(n);
            }
        }
        reserved.sort();
        assert_eq!(reserved, (1..=30).collect::<Vec<u32>>());

        let record = store.get_scarcity("5-00001").await.unwrap().unwrap();
        assert_eq!(record.total_spawned, 30);
    }

    #[tokio::test]
    async fn test_ensure_scarcity_keeps_existing_cap() {
        let store = MemoryStore::new();
        store.ensure_scarcity("1-00001", 200).await.unwrap();
        let again = store.ensure_scarcity("1-00001", 999).await.unwrap();
        assert_eq!(again.max_copies, 200);
    }

    #[tokio::test]
    async fn test_duplicate_copy_number_rejected() {
        let store = MemoryStore::new();
        let first = OwnedCopy::mint("a", "1-00001", 1, Utc::now());
        let clash = OwnedCopy::mint("b", "1-00001", 1, Utc::now());
        store.insert_copy(&first).await.unwrap();
        assert!(matches!(
            store.insert_copy(&clash).await,
            Err(CardError::AlreadyExists(_))
        ));
    }
}

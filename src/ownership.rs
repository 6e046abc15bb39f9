//! Ownership ledger: claims, merges, gifts and collection views.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::domain::{OwnedCopy, ScarcityRecord, Tier};
use crate::error::{CardError, Result};
use crate::pricing::{describe, CopyView};
use crate::services::Metrics;
use crate::spawn::OpenSpawnTable;
use crate::store::DocumentStore;

/// Result of a successful claim
#[derive(Debug, Clone)]
pub struct Claimed {
    pub copy: OwnedCopy,
    pub view: CopyView,
    /// Chat the spawn was announced in
    pub chat_id: String,
    /// Whether this was the claimant's first copy of the collectible
    pub first_copy_for_owner: bool,
}

#[derive(Debug, Clone)]
pub struct Merged {
    pub kept: OwnedCopy,
    pub destroyed: OwnedCopy,
}

pub struct OwnershipLedger {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<Catalog>,
    metrics: Arc<Metrics>,
}

impl OwnershipLedger {
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Arc<Catalog>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            catalog,
            metrics,
        }
    }

    /// Claim the open spawn of `collectible_id` for `claimant`.
    ///
    /// Removal from the open-spawn table decides the winner; everybody else,
    /// and every claim on an expired or unknown spawn, gets `NoActiveSpawn`.
    #[instrument(skip(self, spawns))]
    pub async fn claim(
        &self,
        spawns: &OpenSpawnTable,
        collectible_id: &str,
        claimant: &str,
    ) -> Result<Claimed> {
        let now = Utc::now();
        let expired = spawns.sweep_expired(now);
        if !expired.is_empty() {
            Metrics::add(&self.metrics.spawns_expired, expired.len() as u64);
        }

        let id = self
            .catalog
            .resolve(collectible_id)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| collectible_id.trim().to_string());

        let Some(spawn) = spawns.take(&id, now) else {
            Metrics::inc(&self.metrics.claims_missed);
            return Err(CardError::NoActiveSpawn(id));
        };

        // The spawn is gone from the table from here on; failures below are
        // reported but the spawn is not re-opened.
        let first_copy_for_owner = !self
            .store
            .copies_by_owner(claimant)
            .await?
            .iter()
            .any(|c| c.collectible_id == id);

        let copy = OwnedCopy::mint(claimant, id.as_str(), spawn.copy_number, now);
        self.store.insert_copy(&copy).await?;
        self.store.record_claim(&id).await?;
        Metrics::inc(&self.metrics.claims);

        info!(
            claimant,
            chat_id = %spawn.chat_id,
            "Claimed {} copy #{}",
            id,
            spawn.copy_number
        );

        let view = self.view(&copy).await?;
        Ok(Claimed {
            copy,
            view,
            chat_id: spawn.chat_id,
            first_copy_for_owner,
        })
    }

    /// Fold one duplicate of `collectible_id` into the owner's earliest copy.
    #[instrument(skip(self))]
    pub async fn merge(&self, owner: &str, collectible_id: &str) -> Result<Merged> {
        let id = self.resolve_id(collectible_id);
        let copies: Vec<OwnedCopy> = self
            .store
            .copies_by_owner(owner)
            .await?
            .into_iter()
            .filter(|c| c.collectible_id == id)
            .collect();

        if copies.len() < 2 {
            return Err(CardError::InsufficientCopies {
                collectible_id: id,
                owned: copies.len(),
                required: 2,
            });
        }

        let kept = copies[0].clone();
        let destroyed = copies[1..]
            .iter()
            .rev()
            .find(|c| !c.for_sale)
            .cloned()
            .ok_or_else(|| {
                CardError::AlreadyListed(format!("every duplicate of {} is listed", id))
            })?;

        detach_from_custom(self.store.as_ref(), &destroyed).await?;
        self.store.delete_copy(destroyed.id).await?;
        self.store.adjust_circulation(&id, -1).await?;
        Metrics::inc(&self.metrics.merges);

        info!(
            owner,
            "Merged {} copy #{} into #{}",
            id,
            destroyed.copy_number,
            kept.copy_number
        );
        Ok(Merged { kept, destroyed })
    }

    /// Gift a copy to another user
    #[instrument(skip(self))]
    pub async fn give(&self, from: &str, to: &str, copy_id: Uuid) -> Result<OwnedCopy> {
        if from == to {
            return Err(CardError::InvalidInput("cannot give a card to yourself".into()));
        }
        let mut copy = self.owned_copy(from, copy_id).await?;
        if copy.for_sale {
            return Err(CardError::AlreadyListed(format!(
                "copy #{} of {}",
                copy.copy_number, copy.collectible_id
            )));
        }

        transfer_copy(self.store.as_ref(), &mut copy, to).await?;
        info!(from, to, "Gave {} copy #{}", copy.collectible_id, copy.copy_number);
        Ok(copy)
    }

    /// Owned copy by id, `NotFound` when it belongs to somebody else
    pub async fn owned_copy(&self, owner: &str, copy_id: Uuid) -> Result<OwnedCopy> {
        match self.store.get_copy(copy_id).await? {
            Some(copy) if copy.owner == owner => Ok(copy),
            _ => Err(CardError::NotFound(format!("card {} in your collection", copy_id))),
        }
    }

    /// Every copy the owner holds, rarest tier first
    pub async fn collection(&self, owner: &str) -> Result<Vec<CopyView>> {
        let copies = self.store.copies_by_owner(owner).await?;
        let mut views = view_copies(self.store.as_ref(), &self.catalog, &copies).await?;
        views.sort_by(|a, b| {
            b.tier
                .cmp(&a.tier)
                .then_with(|| a.collectible_id.cmp(&b.collectible_id))
                .then_with(|| a.copy_number.cmp(&b.copy_number))
        });
        Ok(views)
    }

    pub async fn collection_by_tier(&self, owner: &str, tier: Tier) -> Result<Vec<CopyView>> {
        Ok(self
            .collection(owner)
            .await?
            .into_iter()
            .filter(|v| v.tier == tier)
            .collect())
    }

    /// Collectibles the owner holds more than one copy of, most copies first
    pub async fn duplicates(&self, owner: &str) -> Result<Vec<(String, usize)>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for copy in self.store.copies_by_owner(owner).await? {
            *counts.entry(copy.collectible_id).or_insert(0) += 1;
        }
        let mut dupes: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
        dupes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(dupes)
    }

    /// Owners ranked by number of copies held
    pub async fn top_collectors(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let mut counts = self.store.owner_counts().await?;
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(limit);
        Ok(counts)
    }

    pub async fn describe(&self, owner: &str, copy_id: Uuid) -> Result<CopyView> {
        let copy = self.owned_copy(owner, copy_id).await?;
        self.view(&copy).await
    }

    async fn view(&self, copy: &OwnedCopy) -> Result<CopyView> {
        let collectible = self.catalog.require(&copy.collectible_id)?;
        let scarcity = self.store.get_scarcity(&copy.collectible_id).await?;
        Ok(describe(copy, collectible, scarcity.as_ref()))
    }

    fn resolve_id(&self, id_or_name: &str) -> String {
        self.catalog
            .resolve(id_or_name)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| id_or_name.trim().to_string())
    }
}

/// Change a copy's owner, dropping it from its custom deck and clearing
/// main-deck slot and sale flag.
pub(crate) async fn transfer_copy(
    store: &dyn DocumentStore,
    copy: &mut OwnedCopy,
    new_owner: &str,
) -> Result<()> {
    detach_from_custom(store, copy).await?;
    copy.transfer_to(new_owner);
    store.update_copy(copy).await
}

/// Remove a copy id from the card list of the custom deck it sits in
pub(crate) async fn detach_from_custom(store: &dyn DocumentStore, copy: &OwnedCopy) -> Result<()> {
    let Some(deck_id) = copy.custom_deck else {
        return Ok(());
    };
    match store.get_deck(deck_id).await? {
        Some(mut deck) => {
            deck.cards.retain(|id| *id != copy.id);
            store.update_deck(&deck).await
        }
        None => {
            debug!("Copy {} pointed at missing deck {}", copy.id, deck_id);
            Ok(())
        }
    }
}

/// Render copies against current scarcity counters. Copies whose collectible
/// left the catalog are skipped.
pub(crate) async fn view_copies(
    store: &dyn DocumentStore,
    catalog: &Catalog,
    copies: &[OwnedCopy],
) -> Result<Vec<CopyView>> {
    let mut records: HashMap<String, Option<ScarcityRecord>> = HashMap::new();
    let mut views = Vec::with_capacity(copies.len());
    for copy in copies {
        let Some(collectible) = catalog.get(&copy.collectible_id) else {
            warn!("Copy {} references unknown collectible {}", copy.id, copy.collectible_id);
            continue;
        };
        if !records.contains_key(&copy.collectible_id) {
            let record = store.get_scarcity(&copy.collectible_id).await?;
            records.insert(copy.collectible_id.clone(), record);
        }
        let scarcity = records.get(&copy.collectible_id).and_then(Option::as_ref);
        views.push(describe(copy, collectible, scarcity));
    }
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::card;
    use crate::domain::{CustomDeck, OpenSpawn};
    use crate::store::MemoryStore;
    use chrono::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: OwnershipLedger,
        spawns: OpenSpawnTable,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = Arc::new(Catalog::from_entries(vec![
            card("1-00001", Tier::One, "Acorn Sprite", "Forest"),
            card("5-00003", Tier::Five, "Glass Heron", "Lake"),
        ]));
        let ledger = OwnershipLedger::new(store.clone(), catalog, Arc::new(Metrics::new()));
        Fixture {
            store,
            ledger,
            spawns: OpenSpawnTable::new(),
        }
    }

    /// Reserve the next copy and open it, as the spawn engine would
    async fn open(f: &Fixture, id: &str, max: u32) -> u32 {
        f.store.ensure_scarcity(id, max).await.unwrap();
        let n = f
            .store
            .reserve_copy(id, false, Utc::now())
            .await
            .unwrap()
            .unwrap();
        let now = Utc::now();
        f.spawns.insert(OpenSpawn {
            collectible_id: id.to_string(),
            copy_number: n,
            price: 100,
            chat_id: "chat".into(),
            created_at: now,
            expires_at: now + Duration::minutes(5),
        });
        n
    }

    #[tokio::test]
    async fn test_claim_mints_copy_and_counts_owner() {
        let f = fixture();
        open(&f, "1-00001", 200).await;

        let claimed = f.ledger.claim(&f.spawns, "1-00001", "alice").await.unwrap();
        assert_eq!(claimed.copy.copy_number, 1);
        assert!(claimed.first_copy_for_owner);
        assert_eq!(claimed.view.price, 20_000);

        open(&f, "1-00001", 200).await;
        let second = f.ledger.claim(&f.spawns, "acorn sprite", "alice").await.unwrap();
        assert_eq!(second.copy.copy_number, 2);
        assert!(!second.first_copy_for_owner);

        let record = f.store.get_scarcity("1-00001").await.unwrap().unwrap();
        assert_eq!(record.total_circulation, 2);
        assert_eq!(record.unique_owners, 2);
    }

    #[tokio::test]
    async fn test_claim_without_spawn() {
        let f = fixture();
        let err = f.ledger.claim(&f.spawns, "1-00001", "bob").await.unwrap_err();
        assert!(matches!(err, CardError::NoActiveSpawn(_)));
    }

    #[tokio::test]
    async fn test_claim_after_expiry_is_rejected_and_swept() {
        let f = fixture();
        f.store.ensure_scarcity("1-00001", 200).await.unwrap();
        let past = Utc::now() - Duration::minutes(10);
        f.spawns.insert(OpenSpawn {
            collectible_id: "1-00001".into(),
            copy_number: 1,
            price: 100,
            chat_id: "chat".into(),
            created_at: past,
            expires_at: past + Duration::minutes(5),
        });

        let err = f.ledger.claim(&f.spawns, "1-00001", "bob").await.unwrap_err();
        assert!(matches!(err, CardError::NoActiveSpawn(_)));
        assert!(f.spawns.is_empty());
        assert_eq!(f.store.copy_count().await, 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_earliest_copy() {
        let f = fixture();
        for _ in 0..3 {
            open(&f, "5-00003", 30).await;
            f.ledger.claim(&f.spawns, "5-00003", "alice").await.unwrap();
        }

        let merged = f.ledger.merge("alice", "5-00003").await.unwrap();
        assert_eq!(merged.kept.copy_number, 1);
        assert_eq!(merged.destroyed.copy_number, 3);

        let record = f.store.get_scarcity("5-00003").await.unwrap().unwrap();
        assert_eq!(record.total_circulation, 2);
        assert_eq!(record.total_spawned, 3);
        assert_eq!(record.unique_owners, 3);
    }

    #[tokio::test]
    async fn test_merge_needs_two_copies() {
        let f = fixture();
        open(&f, "5-00003", 30).await;
        f.ledger.claim(&f.spawns, "5-00003", "alice").await.unwrap();

        let err = f.ledger.merge("alice", "5-00003").await.unwrap_err();
        assert!(matches!(
            err,
            CardError::InsufficientCopies {
                owned: 1,
                required: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_merge_skips_listed_duplicates() {
        let f = fixture();
        for _ in 0..2 {
            open(&f, "5-00003", 30).await;
            f.ledger.claim(&f.spawns, "5-00003", "alice").await.unwrap();
        }
        let mut copies = f.store.copies_by_owner("alice").await.unwrap();
        copies[1].mark_for_sale(5_000);
        f.store.update_copy(&copies[1]).await.unwrap();

        let err = f.ledger.merge("alice", "5-00003").await.unwrap_err();
        assert!(matches!(err, CardError::AlreadyListed(_)));
    }

    #[tokio::test]
    async fn test_give_moves_copy_out_of_decks() {
        let f = fixture();
        open(&f, "1-00001", 200).await;
        let claimed = f.ledger.claim(&f.spawns, "1-00001", "alice").await.unwrap();

        let mut deck = CustomDeck::new("alice", "Keepers");
        deck.cards.push(claimed.copy.id);
        f.store.insert_deck(&deck).await.unwrap();
        let mut copy = claimed.copy.clone();
        copy.deck_slot = Some(1);
        copy.custom_deck = Some(deck.id);
        f.store.update_copy(&copy).await.unwrap();

        let given = f.ledger.give("alice", "bob", copy.id).await.unwrap();
        assert_eq!(given.owner, "bob");
        assert!(given.deck_slot.is_none());
        assert!(given.custom_deck.is_none());

        let deck = f.store.get_deck(deck.id).await.unwrap().unwrap();
        assert!(deck.cards.is_empty());
        assert!(f.ledger.give("alice", "carol", copy.id).await.is_err());
    }

    #[tokio::test]
    async fn test_views_and_rankings() {
        let f = fixture();
        for _ in 0..2 {
            open(&f, "1-00001", 200).await;
            f.ledger.claim(&f.spawns, "1-00001", "alice").await.unwrap();
        }
        open(&f, "5-00003", 30).await;
        f.ledger.claim(&f.spawns, "5-00003", "alice").await.unwrap();
        open(&f, "1-00001", 200).await;
        f.ledger.claim(&f.spawns, "1-00001", "bob").await.unwrap();

        let collection = f.ledger.collection("alice").await.unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection[0].tier, Tier::Five);

        let tier_one = f.ledger.collection_by_tier("alice", Tier::One).await.unwrap();
        assert_eq!(tier_one.len(), 2);

        assert_eq!(
            f.ledger.duplicates("alice").await.unwrap(),
            vec![("1-00001".to_string(), 2)]
        );
        assert_eq!(
            f.ledger.top_collectors(10).await.unwrap(),
            vec![("alice".to_string(), 3), ("bob".to_string(), 1)]
        );
    }
}

//! Main deck (numbered slots) and named custom decks.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::domain::{CustomDeck, OwnedCopy, MAIN_DECK_SLOTS};
use crate::error::{CardError, Result};
use crate::ownership::view_copies;
use crate::pricing::CopyView;
use crate::store::DocumentStore;

const MAX_DECK_NAME_LEN: usize = 32;

/// One main-deck slot and the card in it
#[derive(Debug, Clone)]
pub struct DeckSlot {
    pub slot: u8,
    pub card: Option<CopyView>,
}

pub struct DeckManager {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<Catalog>,
}

impl DeckManager {
    pub fn new(store: Arc<dyn DocumentStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    // ==================== Main deck ====================

    /// All slots in order, empty ones included
    pub async fn main_deck(&self, owner: &str) -> Result<Vec<DeckSlot>> {
        let slotted: Vec<OwnedCopy> = self
            .store
            .copies_by_owner(owner)
            .await?
            .into_iter()
            .filter(|c| c.deck_slot.is_some())
            .collect();
        let views = view_copies(self.store.as_ref(), &self.catalog, &slotted).await?;

        Ok((1..=MAIN_DECK_SLOTS)
            .map(|slot| DeckSlot {
                slot,
                card: views.iter().find(|v| v.deck_slot == Some(slot)).cloned(),
            })
            .collect())
    }

    /// Put a copy in the lowest free slot; returns the slot
    #[instrument(skip(self))]
    pub async fn add_to_deck(&self, owner: &str, copy_id: Uuid) -> Result<u8> {
        let copies = self.store.copies_by_owner(owner).await?;
        let mut copy = copies
            .iter()
            .find(|c| c.id == copy_id)
            .cloned()
            .ok_or_else(|| CardError::NotFound(format!("card {} in your collection", copy_id)))?;
        if let Some(slot) = copy.deck_slot {
            return Err(CardError::AlreadyInDeck(format!("card is already in slot {}", slot)));
        }

        let slot = (1..=MAIN_DECK_SLOTS)
            .find(|slot| !copies.iter().any(|c| c.deck_slot == Some(*slot)))
            .ok_or_else(|| {
                CardError::CapacityExceeded(format!("main deck is full ({} slots)", MAIN_DECK_SLOTS))
            })?;

        copy.deck_slot = Some(slot);
        self.store.update_copy(&copy).await?;
        info!(owner, "Put {} copy #{} in slot {}", copy.collectible_id, copy.copy_number, slot);
        Ok(slot)
    }

    /// Empty a slot; returns the copy that was in it
    pub async fn remove_from_deck(&self, owner: &str, slot: u8) -> Result<OwnedCopy> {
        check_slot(slot)?;
        let mut copy = self
            .copy_in_slot(owner, slot)
            .await?
            .ok_or_else(|| CardError::NotFound(format!("card in deck slot {}", slot)))?;
        copy.deck_slot = None;
        self.store.update_copy(&copy).await?;
        Ok(copy)
    }

    /// Exchange the occupants of two slots; either may be empty
    pub async fn swap(&self, owner: &str, a: u8, b: u8) -> Result<()> {
        check_slot(a)?;
        check_slot(b)?;
        if a == b {
            return Ok(());
        }

        let first = self.copy_in_slot(owner, a).await?;
        let second = self.copy_in_slot(owner, b).await?;
        if first.is_none() && second.is_none() {
            return Err(CardError::NotFound(format!("cards in slots {} and {}", a, b)));
        }

        // clear both before writing so the per-owner slot uniqueness holds in every store
        for copy in first.iter().chain(second.iter()) {
            let mut cleared = copy.clone();
            cleared.deck_slot = None;
            self.store.update_copy(&cleared).await?;
        }
        if let Some(mut copy) = first {
            copy.deck_slot = Some(b);
            self.store.update_copy(&copy).await?;
        }
        if let Some(mut copy) = second {
            copy.deck_slot = Some(a);
            self.store.update_copy(&copy).await?;
        }
        Ok(())
    }

    async fn copy_in_slot(&self, owner: &str, slot: u8) -> Result<Option<OwnedCopy>> {
        Ok(self
            .store
            .copies_by_owner(owner)
            .await?
            .into_iter()
            .find(|c| c.deck_slot == Some(slot)))
    }

    // ==================== Custom decks ====================

    #[instrument(skip(self))]
    pub async fn create_deck(&self, owner: &str, name: &str) -> Result<CustomDeck> {
        let name = check_name(name)?;
        if self.find_deck(owner, name).await?.is_some() {
            return Err(CardError::AlreadyExists(format!("deck \"{}\"", name)));
        }
        let deck = CustomDeck::new(owner, name);
        self.store.insert_deck(&deck).await?;
        Ok(deck)
    }

    pub async fn rename_deck(&self, owner: &str, name: &str, new_name: &str) -> Result<CustomDeck> {
        let new_name = check_name(new_name)?;
        let mut deck = self.require_deck(owner, name).await?;
        if let Some(other) = self.find_deck(owner, new_name).await? {
            if other.id != deck.id {
                return Err(CardError::AlreadyExists(format!("deck \"{}\"", new_name)));
            }
        }
        deck.name = new_name.to_string();
        self.store.update_deck(&deck).await?;
        Ok(deck)
    }

    /// Delete a custom deck together with every card in it. Returns the
    /// number of cards destroyed.
    #[instrument(skip(self))]
    pub async fn delete_deck(&self, owner: &str, name: &str) -> Result<usize> {
        let deck = self.require_deck(owner, name).await?;

        let mut doomed = Vec::with_capacity(deck.cards.len());
        for id in &deck.cards {
            if let Some(copy) = self.store.get_copy(*id).await? {
                if copy.owner != owner {
                    continue;
                }
                if copy.for_sale {
                    return Err(CardError::AlreadyListed(format!(
                        "{} copy #{} is listed, cancel the listing first",
                        copy.collectible_id, copy.copy_number
                    )));
                }
                doomed.push(copy);
            }
        }

        for copy in &doomed {
            self.store.delete_copy(copy.id).await?;
            self.store.adjust_circulation(&copy.collectible_id, -1).await?;
        }
        self.store.delete_deck(deck.id).await?;
        info!(owner, "Deleted deck \"{}\" and {} card(s)", deck.name, doomed.len());
        Ok(doomed.len())
    }

    pub async fn add_to_custom(&self, owner: &str, name: &str, copy_id: Uuid) -> Result<CustomDeck> {
        let mut deck = self.require_deck(owner, name).await?;
        let mut copy = match self.store.get_copy(copy_id).await? {
            Some(copy) if copy.owner == owner => copy,
            _ => return Err(CardError::NotFound(format!("card {} in your collection", copy_id))),
        };
        if copy.custom_deck.is_some() {
            return Err(CardError::AlreadyInDeck("card is already in a custom deck".into()));
        }

        deck.cards.push(copy.id);
        self.store.update_deck(&deck).await?;
        copy.custom_deck = Some(deck.id);
        self.store.update_copy(&copy).await?;
        Ok(deck)
    }

    /// Take the card at 1-based `position` out of a custom deck
    pub async fn remove_from_custom(&self, owner: &str, name: &str, position: usize) -> Result<CustomDeck> {
        let mut deck = self.require_deck(owner, name).await?;
        if position == 0 || position > deck.cards.len() {
            return Err(CardError::NotFound(format!(
                "position {} in deck \"{}\"",
                position, deck.name
            )));
        }
        let id = deck.cards.remove(position - 1);
        self.store.update_deck(&deck).await?;

        if let Some(mut copy) = self.store.get_copy(id).await? {
            copy.custom_deck = None;
            self.store.update_copy(&copy).await?;
        }
        Ok(deck)
    }

    /// A custom deck and its cards in deck order
    pub async fn view_deck(&self, owner: &str, name: &str) -> Result<(CustomDeck, Vec<CopyView>)> {
        let deck = self.require_deck(owner, name).await?;
        let mut cards = Vec::with_capacity(deck.cards.len());
        for id in &deck.cards {
            if let Some(copy) = self.store.get_copy(*id).await? {
                cards.push(copy);
            }
        }
        let views = view_copies(self.store.as_ref(), &self.catalog, &cards).await?;
        Ok((deck, views))
    }

    pub async fn list_decks(&self, owner: &str) -> Result<Vec<CustomDeck>> {
        self.store.decks_by_owner(owner).await
    }

    async fn find_deck(&self, owner: &str, name: &str) -> Result<Option<CustomDeck>> {
        Ok(self
            .store
            .decks_by_owner(owner)
            .await?
            .into_iter()
            .find(|d| d.name_matches(name)))
    }

    async fn require_deck(&self, owner: &str, name: &str) -> Result<CustomDeck> {
        self.find_deck(owner, name)
            .await?
            .ok_or_else(|| CardError::NotFound(format!("deck \"{}\"", name.trim())))
    }
}

fn check_slot(slot: u8) -> Result<()> {
    if slot == 0 || slot > MAIN_DECK_SLOTS {
        return Err(CardError::InvalidInput(format!(
            "deck slot must be between 1 and {}",
            MAIN_DECK_SLOTS
        )));
    }
    Ok(())
}

fn check_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CardError::InvalidInput("deck name cannot be empty".into()));
    }
    if name.chars().count() > MAX_DECK_NAME_LEN {
        return Err(CardError::InvalidInput(format!(
            "deck name is longer than {} characters",
            MAX_DECK_NAME_LEN
        )));
    }
    Ok(name)
}

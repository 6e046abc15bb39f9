use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of numbered main-deck slots per owner
pub const MAIN_DECK_SLOTS: u8 = 12;

/// One minted, owned instance of a collectible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCopy {
    pub id: Uuid,
    pub owner: String,
    pub collectible_id: String,
    /// `total_spawned` at mint time; never changes
    pub copy_number: u32,
    pub acquired_at: DateTime<Utc>,
    /// Main-deck slot, 1..=MAIN_DECK_SLOTS
    pub deck_slot: Option<u8>,
    pub custom_deck: Option<Uuid>,
    pub for_sale: bool,
    pub sale_price: Option<u64>,
}

impl OwnedCopy {
    pub fn mint(
        owner: impl Into<String>,
        collectible_id: impl Into<String>,
        copy_number: u32,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            collectible_id: collectible_id.into(),
            copy_number,
            acquired_at,
            deck_slot: None,
            custom_deck: None,
            for_sale: false,
            sale_price: None,
        }
    }

    /// Hand the copy to a new owner, dropping every per-owner placement
    pub fn transfer_to(&mut self, new_owner: impl Into<String>) {
        self.owner = new_owner.into();
        self.deck_slot = None;
        self.custom_deck = None;
        self.clear_sale();
    }

    pub fn mark_for_sale(&mut self, price: u64) {
        self.for_sale = true;
        self.sale_price = Some(price);
    }

    pub fn clear_sale(&mut self) {
        self.for_sale = false;
        self.sale_price = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_clears_placement() {
        let mut copy = OwnedCopy::mint("alice", "2-00010", 7, Utc::now());
        copy.deck_slot = Some(3);
        copy.custom_deck = Some(Uuid::new_v4());
        copy.mark_for_sale(900);

        copy.transfer_to("bob");

        assert_eq!(copy.owner, "bob");
        assert_eq!(copy.copy_number, 7);
        assert!(copy.deck_slot.is_none());
        assert!(copy.custom_deck.is_none());
        assert!(!copy.for_sale);
        assert!(copy.sale_price.is_none());
    }
}

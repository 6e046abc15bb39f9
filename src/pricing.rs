//! Rarity labels and scarcity pricing.
//!
//! Everything here is pure: the same inputs always produce the same label and
//! price, so captions at spawn time and later card views agree whenever the
//! ledger counters agree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Collectible, OwnedCopy, ScarcityRecord, Tier};

/// Human-facing rarity of a specific copy, rarest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Mythic,
    Legendary,
    Exotic,
    Epic,
    Rare,
    Uncommon,
    Common,
}

impl Rarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Mythic => "Mythic",
            Rarity::Legendary => "Legendary",
            Rarity::Exotic => "Exotic",
            Rarity::Epic => "Epic",
            Rarity::Rare => "Rare",
            Rarity::Uncommon => "Uncommon",
            Rarity::Common => "Common",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upper bounds of `copy_number / max_copies` for the percentage bands
const RARITY_BANDS: [(f64, Rarity); 4] = [
    (0.05, Rarity::Exotic),
    (0.15, Rarity::Epic),
    (0.35, Rarity::Rare),
    (0.70, Rarity::Uncommon),
];

/// Rarity of copy `copy_number` out of `max_copies`.
///
/// The copy-number rules win over the percentage bands: copy #1 is always
/// Mythic and copies #2-#3 are always Legendary, even for tiny caps.
pub fn rarity_of(copy_number: u32, max_copies: u32) -> Rarity {
    match copy_number {
        0 | 1 => return Rarity::Mythic,
        2 | 3 => return Rarity::Legendary,
        _ => {}
    }

    let fraction = f64::from(copy_number) / f64::from(max_copies.max(1));
    RARITY_BANDS
        .iter()
        .find(|(limit, _)| fraction <= *limit)
        .map(|(_, rarity)| *rarity)
        .unwrap_or(Rarity::Common)
}

/// Market price of a collectible given current circulation.
///
/// `base * max(max_copies / max(total_spawned, 1), 1)`, rounded, never below base.
pub fn price_of(tier: Tier, total_spawned: u32, max_copies: u32) -> u64 {
    let base = tier.base_price();
    let ratio = f64::from(max_copies) / f64::from(total_spawned.max(1));
    let price = (base as f64 * ratio.max(1.0)).round() as u64;
    price.max(base)
}

/// Display model for one owned copy, priced against the ledger's current counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyView {
    pub collectible_id: String,
    pub name: String,
    pub series: String,
    pub tier: Tier,
    pub copy_number: u32,
    pub max_copies: u32,
    pub rarity: Rarity,
    pub price: u64,
    pub deck_slot: Option<u8>,
    pub for_sale: bool,
}

impl CopyView {
    pub fn line(&self) -> String {
        let mut line = format!(
            "{} {} [{}] #{}/{} · {} · {} coins",
            self.tier.stars(),
            self.name,
            self.collectible_id,
            self.copy_number,
            self.max_copies,
            self.rarity,
            self.price
        );
        if let Some(slot) = self.deck_slot {
            line.push_str(&format!(" · slot {}", slot));
        }
        if self.for_sale {
            line.push_str(" · for sale");
        }
        line
    }
}

/// Build the view of a copy. A missing scarcity record falls back to the tier cap
/// with the copy's own number as circulation.
pub fn describe(
    copy: &OwnedCopy,
    collectible: &Collectible,
    scarcity: Option<&ScarcityRecord>,
) -> CopyView {
    let (max_copies, spawned) = scarcity
        .map(|s| (s.max_copies, s.total_spawned))
        .unwrap_or((collectible.tier.max_copies(), copy.copy_number));

    CopyView {
        collectible_id: collectible.id.clone(),
        name: collectible.name.clone(),
        series: collectible.series.clone(),
        tier: collectible.tier,
        copy_number: copy.copy_number,
        max_copies,
        rarity: rarity_of(copy.copy_number, max_copies),
        price: price_of(collectible.tier, spawned, max_copies),
        deck_slot: copy.deck_slot,
        for_sale: copy.for_sale,
    }
}

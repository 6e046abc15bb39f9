use serde::Serialize;
use tabled::Tabled;

use super::output::{print_items, OutputMode};
use crate::catalog::Catalog;
use crate::domain::{Collectible, Tier};
use crate::error::Result;
use crate::pricing::{price_of, rarity_of};

#[derive(Debug, Serialize, Tabled)]
pub struct CollectibleRow {
    pub id: String,
    pub tier: String,
    pub name: String,
    pub series: String,
    pub creator: String,
    pub max_copies: u32,
    pub base_price: u64,
}

impl From<&Collectible> for CollectibleRow {
    fn from(c: &Collectible) -> Self {
        Self {
            id: c.id.clone(),
            tier: c.tier.to_string(),
            name: c.name.clone(),
            series: c.series.clone(),
            creator: c.creator.clone(),
            max_copies: c.tier.max_copies(),
            base_price: c.tier.base_price(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct SeriesRow {
    pub series: String,
    pub collectibles: usize,
}

#[derive(Debug, Serialize, Tabled)]
pub struct PriceRow {
    pub copy: u32,
    pub rarity: String,
    /// Price while this copy is the latest one spawned
    pub price: u64,
}

/// `catalog [--tier] [--search]`
pub fn list(catalog: &Catalog, tier: Option<Tier>, search: Option<&str>, mode: OutputMode) -> Result<()> {
    let mut entries: Vec<&Collectible> = match search {
        Some(query) => catalog.search(query),
        None => Tier::ALL.iter().rev().flat_map(|t| catalog.tier(*t)).collect(),
    };
    if let Some(tier) = tier {
        entries.retain(|c| c.tier == tier);
    }
    let rows: Vec<CollectibleRow> = entries.into_iter().map(CollectibleRow::from).collect();
    print_items(&rows, mode)
}

/// `series`
pub fn series(catalog: &Catalog, mode: OutputMode) -> Result<()> {
    let rows: Vec<SeriesRow> = catalog
        .series()
        .into_iter()
        .map(|(series, collectibles)| SeriesRow {
            series,
            collectibles,
        })
        .collect();
    print_items(&rows, mode)
}

/// Rows for `price`: the copy numbers around `spawned` plus the rarity band edges
pub fn price_rows(tier: Tier, spawned: u32, max: Option<u32>) -> Vec<PriceRow> {
    let max = max.unwrap_or_else(|| tier.max_copies()).max(1);
    let mut copies: Vec<u32> = vec![1, 2, 3, spawned.max(1), max];
    for pct in [5, 15, 35, 70] {
        copies.push((max * pct / 100).max(1));
    }
    copies.sort_unstable();
    copies.dedup();

    copies
        .into_iter()
        .map(|copy| PriceRow {
            copy,
            rarity: rarity_of(copy, max).to_string(),
            price: price_of(tier, copy, max),
        })
        .collect()
}

/// `price --tier --spawned [--max]`
pub fn price(tier: Tier, spawned: u32, max: Option<u32>, mode: OutputMode) -> Result<()> {
    let cap = max.unwrap_or_else(|| tier.max_copies());
    if mode == OutputMode::Table {
        println!(
            "Tier {} ({} copies, base {}): current price {}",
            tier,
            cap,
            tier.base_price(),
            price_of(tier, spawned, cap)
        );
    }
    print_items(&price_rows(tier, spawned, max), mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_rows_cover_band_edges() {
        let rows = price_rows(Tier::One, 50, None);
        let copies: Vec<u32> = rows.iter().map(|r| r.copy).collect();
        assert_eq!(copies, vec![1, 2, 3, 10, 30, 50, 70, 140, 200]);
        assert_eq!(rows[0].rarity, "Mythic");
        assert_eq!(rows.last().map(|r| r.price), Some(100));
    }

    #[test]
    fn test_price_rows_tiny_cap() {
        let rows = price_rows(Tier::S, 0, None);
        let copies: Vec<u32> = rows.iter().map(|r| r.copy).collect();
        assert_eq!(copies, vec![1, 2, 3, 5]);
    }
}

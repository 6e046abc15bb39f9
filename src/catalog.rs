//! In-memory collectible catalog, loaded once at startup.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{Collectible, Tier};
use crate::error::{CardError, Result};

#[derive(Debug, Default)]
pub struct Catalog {
    by_id: HashMap<String, Collectible>,
    by_tier: HashMap<Tier, Vec<String>>,
}

impl Catalog {
    /// Build indexes from catalog entries. Later duplicates of an id are ignored.
    pub fn from_entries(entries: Vec<Collectible>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            if catalog.by_id.contains_key(&entry.id) {
                warn!("Duplicate catalog id {}, keeping first entry", entry.id);
                continue;
            }
            catalog
                .by_tier
                .entry(entry.tier)
                .or_default()
                .push(entry.id.clone());
            catalog.by_id.insert(entry.id.clone(), entry);
        }
        for ids in catalog.by_tier.values_mut() {
            ids.sort();
        }
        catalog
    }

    /// Load a JSON array of collectibles from disk
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<Collectible> = serde_json::from_str(&raw)?;
        if entries.is_empty() {
            return Err(CardError::InvalidInput(format!(
                "catalog {} is empty",
                path.display()
            )));
        }

        let catalog = Self::from_entries(entries);
        info!(
            "Loaded catalog from {} ({} collectibles)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Collectible> {
        self.by_id.get(id)
    }

    /// Look up by exact id, then by case-insensitive name
    pub fn resolve(&self, id_or_name: &str) -> Option<&Collectible> {
        let key = id_or_name.trim();
        if let Some(found) = self.by_id.get(key) {
            return Some(found);
        }
        let wanted = key.to_lowercase();
        let mut matches: Vec<&Collectible> = self
            .by_id
            .values()
            .filter(|c| c.name.to_lowercase() == wanted)
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.into_iter().next()
    }

    pub fn require(&self, id: &str) -> Result<&Collectible> {
        self.get(id)
            .ok_or_else(|| CardError::NotFound(format!("collectible {}", id)))
    }

    /// Ids of every collectible in a tier, sorted
    pub fn tier_ids(&self, tier: Tier) -> &[String] {
        self.by_tier.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tier(&self, tier: Tier) -> Vec<&Collectible> {
        self.tier_ids(tier)
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    /// Case-insensitive substring search over id, name, series and creator
    pub fn search(&self, query: &str) -> Vec<&Collectible> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<&Collectible> = self
            .by_id
            .values()
            .filter(|c| {
                c.id.to_lowercase().contains(&needle)
                    || c.name.to_lowercase().contains(&needle)
                    || c.series.to_lowercase().contains(&needle)
                    || c.creator.to_lowercase().contains(&needle)
            })
            .collect();
        hits.sort_by(|a, b| b.tier.cmp(&a.tier).then_with(|| a.id.cmp(&b.id)));
        hits
    }

    /// Series name -> number of collectibles in it
    pub fn series(&self) -> BTreeMap<String, usize> {
        let mut series = BTreeMap::new();
        for collectible in self.by_id.values() {
            *series.entry(collectible.series.clone()).or_insert(0) += 1;
        }
        series
    }
}

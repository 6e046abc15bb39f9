use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-collectible counters driving rarity and pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScarcityRecord {
    pub collectible_id: String,
    /// Fixed at creation from the collectible's tier
    pub max_copies: u32,
    /// Monotonic mint counter; the value at mint time is the copy number
    pub total_spawned: u32,
    pub unique_owners: u32,
    /// Copies currently owned (not destroyed)
    pub total_circulation: u32,
    pub last_trade_price: Option<u64>,
    /// Most recent trade prices, oldest first
    pub recent_trades: Vec<u64>,
    pub last_spawned_at: Option<DateTime<Utc>>,
}

impl ScarcityRecord {
    pub fn new(collectible_id: impl Into<String>, max_copies: u32) -> Self {
        Self {
            collectible_id: collectible_id.into(),
            max_copies,
            total_spawned: 0,
            unique_owners: 0,
            total_circulation: 0,
            last_trade_price: None,
            recent_trades: Vec::new(),
            last_spawned_at: None,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.total_spawned < self.max_copies
    }

    pub fn remaining(&self) -> u32 {
        self.max_copies.saturating_sub(self.total_spawned)
    }

    /// Reserve the next copy number. Returns `None` when the cap is reached
    /// and `bypass_cap` is not set.
    pub fn reserve(&mut self, bypass_cap: bool, now: DateTime<Utc>) -> Option<u32> {
        if !bypass_cap && !self.has_capacity() {
            return None;
        }
        self.total_spawned += 1;
        self.last_spawned_at = Some(now);
        Some(self.total_spawned)
    }

    /// Undo the reservation of `copy_number` after a failed publish. Only the
    /// latest reservation can be undone; an older one stays consumed so copy
    /// numbers are never handed out twice.
    pub fn release(&mut self, copy_number: u32) -> bool {
        if copy_number == 0 || self.total_spawned != copy_number {
            return false;
        }
        self.total_spawned -= 1;
        true
    }

    /// Every successful claim counts one more owner and one more copy in circulation
    pub fn record_claim(&mut self) {
        self.total_circulation += 1;
        self.unique_owners += 1;
    }

    pub fn adjust_circulation(&mut self, delta: i64) {
        let next = i64::from(self.total_circulation) + delta;
        self.total_circulation = next.clamp(0, i64::from(u32::MAX)) as u32;
    }

    pub fn record_trade(&mut self, price: u64, keep: usize) {
        self.last_trade_price = Some(price);
        self.recent_trades.push(price);
        if self.recent_trades.len() > keep {
            let excess = self.recent_trades.len() - keep;
            self.recent_trades.drain(..excess);
        }
    }
}

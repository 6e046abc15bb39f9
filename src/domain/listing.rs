use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Sale,
    Auction,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Sale => "sale",
            ListingKind::Auction => "auction",
        }
    }
}

impl TryFrom<&str> for ListingKind {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "sale" => Ok(ListingKind::Sale),
            "auction" => Ok(ListingKind::Auction),
            _ => Err(format!("Unknown listing kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Sold,
    Cancelled,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ListingStatus::Active)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ListingStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "active" => Ok(ListingStatus::Active),
            "sold" => Ok(ListingStatus::Sold),
            "cancelled" => Ok(ListingStatus::Cancelled),
            "expired" => Ok(ListingStatus::Expired),
            _ => Err(format!("Unknown listing status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: String,
    pub amount: u64,
    pub at: DateTime<Utc>,
}

/// A sale or auction over one owned copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListing {
    pub id: Uuid,
    pub copy_id: Uuid,
    pub collectible_id: String,
    pub seller: String,
    pub kind: ListingKind,
    /// Fixed price for sales, starting price for auctions
    pub price: u64,
    pub bids: Vec<Bid>,
    pub high_bid: Option<u64>,
    pub high_bidder: Option<String>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
}

impl MarketListing {
    pub fn sale(
        copy_id: Uuid,
        collectible_id: impl Into<String>,
        seller: impl Into<String>,
        price: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            copy_id,
            collectible_id: collectible_id.into(),
            seller: seller.into(),
            kind: ListingKind::Sale,
            price,
            bids: Vec::new(),
            high_bid: None,
            high_bidder: None,
            ends_at: None,
            status: ListingStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn auction(
        copy_id: Uuid,
        collectible_id: impl Into<String>,
        seller: impl Into<String>,
        starting_price: u64,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ListingKind::Auction,
            ends_at: Some(ends_at),
            ..Self::sale(copy_id, collectible_id, seller, starting_price)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.map(|end| now >= end).unwrap_or(false)
    }

    /// Smallest amount the next bid must reach
    pub fn minimum_bid(&self) -> u64 {
        let above_high = self.high_bid.map(|b| b.saturating_add(1)).unwrap_or(0);
        above_high.max(self.price)
    }

    pub fn record_bid(&mut self, bidder: impl Into<String>, amount: u64, at: DateTime<Utc>) {
        let bidder = bidder.into();
        self.bids.push(Bid {
            bidder: bidder.clone(),
            amount,
            at,
        });
        self.high_bid = Some(amount);
        self.high_bidder = Some(bidder);
    }
}

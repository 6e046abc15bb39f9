use tracing::{info, instrument, warn};

use super::Marketplace;
use crate::domain::{ListingKind, ListingStatus, MarketListing, OwnedCopy};
use crate::error::{CardError, Result};

/// A completed fixed-price purchase
#[derive(Debug, Clone)]
pub struct Purchase {
    pub listing: MarketListing,
    pub copy: OwnedCopy,
}

impl Marketplace {
    /// List the card in `deck_slot` at a fixed price
    #[instrument(skip(self))]
    pub async fn list_for_sale(&self, owner: &str, deck_slot: u8, price: u64) -> Result<MarketListing> {
        if price == 0 {
            return Err(CardError::InvalidInput("price must be positive".into()));
        }
        let _gate = self.gate.lock().await;

        let mut copy = self.copy_in_slot(owner, deck_slot).await?;
        if copy.for_sale {
            return Err(CardError::AlreadyListed(format!(
                "{} copy #{}",
                copy.collectible_id, copy.copy_number
            )));
        }

        let listing = MarketListing::sale(copy.id, copy.collectible_id.clone(), owner, price);
        self.store.insert_listing(&listing).await?;
        copy.mark_for_sale(price);
        self.store.update_copy(&copy).await?;

        info!(owner, "Listed {} copy #{} for {}", copy.collectible_id, copy.copy_number, price);
        Ok(listing)
    }

    /// Withdraw every active sale of `owner`; returns how many were cancelled
    #[instrument(skip(self))]
    pub async fn cancel_sale(&self, owner: &str) -> Result<usize> {
        let _gate = self.gate.lock().await;

        let mine: Vec<MarketListing> = self
            .store
            .active_listings(ListingKind::Sale)
            .await?
            .into_iter()
            .filter(|l| l.seller == owner)
            .collect();
        if mine.is_empty() {
            return Err(CardError::NoActiveListing(format!("{} has no active sales", owner)));
        }

        for mut listing in mine.iter().cloned() {
            listing.status = ListingStatus::Cancelled;
            self.store.update_listing(&listing).await?;
            self.unflag(&listing).await?;
        }
        info!(owner, "Cancelled {} sale listing(s)", mine.len());
        Ok(mine.len())
    }

    /// Active sales, cheapest first; `buy` indexes into this order
    pub async fn active_sales(&self) -> Result<Vec<MarketListing>> {
        let mut sales = self.store.active_listings(ListingKind::Sale).await?;
        sales.sort_by(|a, b| {
            a.price
                .cmp(&b.price)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(sales)
    }

    /// Buy the `index`-th (1-based) entry of [`Marketplace::active_sales`]
    #[instrument(skip(self))]
    pub async fn buy(&self, buyer: &str, index: usize) -> Result<Purchase> {
        let _gate = self.gate.lock().await;

        let sales = self.active_sales().await?;
        let mut listing = index
            .checked_sub(1)
            .and_then(|i| sales.get(i))
            .cloned()
            .ok_or_else(|| CardError::NotFound(format!("listing #{}", index)))?;

        if listing.seller == buyer {
            return Err(CardError::Unauthorized("cannot buy your own listing".into()));
        }

        let mut copy = match self.store.get_copy(listing.copy_id).await? {
            Some(copy) if copy.owner == listing.seller => copy,
            _ => {
                warn!("Listing {} points at a card the seller no longer owns", listing.id);
                listing.status = ListingStatus::Cancelled;
                self.store.update_listing(&listing).await?;
                return Err(CardError::NotFound(format!("listing #{}", index)));
            }
        };

        let price = listing.price;
        self.settle_trade(&mut listing, &mut copy, buyer, price).await?;
        Ok(Purchase { listing, copy })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, slotted};
    use super::*;
    use crate::adapters::CurrencyLedger;
    use crate::store::DocumentStore;

    #[tokio::test]
    async fn test_list_and_relist() {
        let f = fixture(&[]);
        slotted(&f, "alice", "3-00002", 1, 2).await;

        let listing = f.market.list_for_sale("alice", 2, 900).await.unwrap();
        assert_eq!(listing.price, 900);
        assert!(matches!(
            f.market.list_for_sale("alice", 2, 950).await,
            Err(CardError::AlreadyListed(_))
        ));
        assert!(matches!(
            f.market.list_for_sale("alice", 3, 950).await,
            Err(CardError::NotFound(_))
        ));
        assert!(matches!(
            f.market.list_for_sale("alice", 2, 0).await,
            Err(CardError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_buy_with_exact_balance() {
        let f = fixture(&[("bob", 1_200), ("alice", 0)]);
        let copy = slotted(&f, "alice", "3-00002", 1, 1).await;
        f.market.list_for_sale("alice", 1, 1_200).await.unwrap();

        let purchase = f.market.buy("bob", 1).await.unwrap();
        assert_eq!(purchase.copy.owner, "bob");
        assert_eq!(purchase.listing.status, ListingStatus::Sold);

        assert_eq!(f.ledger.balance("bob").await.unwrap(), 0);
        assert_eq!(f.ledger.balance("alice").await.unwrap(), 1_200);

        let stored = f.store.get_copy(copy.id).await.unwrap().unwrap();
        assert_eq!(stored.owner, "bob");
        assert!(!stored.for_sale);
        assert!(stored.deck_slot.is_none());

        let record = f.store.get_scarcity("3-00002").await.unwrap().unwrap();
        assert_eq!(record.last_trade_price, Some(1_200));
        assert!(f.market.active_sales().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buy_rejections() {
        let f = fixture(&[("bob", 100)]);
        slotted(&f, "alice", "3-00002", 1, 1).await;
        f.market.list_for_sale("alice", 1, 500).await.unwrap();

        assert!(matches!(f.market.buy("bob", 0).await, Err(CardError::NotFound(_))));
        assert!(matches!(f.market.buy("bob", 2).await, Err(CardError::NotFound(_))));
        assert!(matches!(
            f.market.buy("alice", 1).await,
            Err(CardError::Unauthorized(_))
        ));
        assert!(matches!(
            f.market.buy("bob", 1).await,
            Err(CardError::InsufficientFunds {
                balance: 100,
                required: 500
            })
        ));
        // nothing moved
        let sales = f.market.active_sales().await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(f.ledger.balance("bob").await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_sales_ordered_by_price() {
        let f = fixture(&[("carol", 10_000)]);
        slotted(&f, "alice", "3-00002", 1, 1).await;
        slotted(&f, "bob", "1-00001", 1, 1).await;
        f.market.list_for_sale("alice", 1, 800).await.unwrap();
        f.market.list_for_sale("bob", 1, 300).await.unwrap();

        let sales = f.market.active_sales().await.unwrap();
        assert_eq!(sales[0].seller, "bob");
        assert_eq!(sales[1].seller, "alice");

        let purchase = f.market.buy("carol", 1).await.unwrap();
        assert_eq!(purchase.listing.collectible_id, "1-00001");
    }

    #[tokio::test]
    async fn test_cancel_sale_clears_flag() {
        let f = fixture(&[]);
        let copy = slotted(&f, "alice", "3-00002", 1, 5).await;
        f.market.list_for_sale("alice", 5, 700).await.unwrap();

        assert_eq!(f.market.cancel_sale("alice").await.unwrap(), 1);
        let stored = f.store.get_copy(copy.id).await.unwrap().unwrap();
        assert!(!stored.for_sale);
        assert_eq!(stored.deck_slot, Some(5));
        assert!(matches!(
            f.market.cancel_sale("alice").await,
            Err(CardError::NoActiveListing(_))
        ));
    }
}

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};

use super::Marketplace;
use crate::services::Metrics;
use crate::domain::{ListingKind, ListingStatus, MarketListing};
use crate::error::{CardError, Result};

/// How an ended auction was closed
#[derive(Debug, Clone)]
pub enum AuctionResult {
    Sold {
        listing: MarketListing,
        winner: String,
        price: u64,
    },
    /// No bids, or the high bidder could not pay
    Expired { listing: MarketListing },
}

impl Marketplace {
    /// Put the card in `deck_slot` up for auction. Only one auction runs at a time.
    #[instrument(skip(self))]
    pub async fn start_auction(
        &self,
        owner: &str,
        deck_slot: u8,
        starting_price: u64,
        duration: Option<Duration>,
    ) -> Result<MarketListing> {
        if starting_price == 0 {
            return Err(CardError::InvalidInput("starting price must be positive".into()));
        }
        let duration =
            duration.unwrap_or_else(|| Duration::seconds(self.config.default_auction_secs as i64));
        if duration <= Duration::zero() {
            return Err(CardError::InvalidInput("auction duration must be positive".into()));
        }

        let _gate = self.gate.lock().await;
        let now = Utc::now();
        self.settle_ended(now).await?;

        if let Some(running) = self.store.active_listings(ListingKind::Auction).await?.first() {
            return Err(CardError::AuctionInProgress(format!(
                "{} is being auctioned by {}",
                running.collectible_id, running.seller
            )));
        }

        let mut copy = self.copy_in_slot(owner, deck_slot).await?;
        if copy.for_sale {
            return Err(CardError::AlreadyListed(format!(
                "{} copy #{}",
                copy.collectible_id, copy.copy_number
            )));
        }

        let listing = MarketListing::auction(
            copy.id,
            copy.collectible_id.clone(),
            owner,
            starting_price,
            now + duration,
        );
        self.store.insert_listing(&listing).await?;
        copy.mark_for_sale(starting_price);
        self.store.update_copy(&copy).await?;

        info!(
            owner,
            "Auction opened for {} copy #{} at {}",
            copy.collectible_id,
            copy.copy_number,
            starting_price
        );
        Ok(listing)
    }

    /// Place a bid on the running auction
    #[instrument(skip(self))]
    pub async fn bid(&self, bidder: &str, amount: u64) -> Result<MarketListing> {
        let _gate = self.gate.lock().await;
        let now = Utc::now();

        let mut auction = self
            .store
            .active_listings(ListingKind::Auction)
            .await?
            .into_iter()
            .find(|l| !l.has_ended(now))
            .ok_or_else(|| CardError::NoActiveListing("no auction is running".into()))?;

        if auction.seller == bidder {
            return Err(CardError::Unauthorized("cannot bid on your own auction".into()));
        }
        let minimum = auction.minimum_bid();
        // a bid at u64::MAX cannot be outbid
        if amount < minimum || auction.high_bid.is_some_and(|high| amount <= high) {
            return Err(CardError::BidTooLow {
                minimum,
                offered: amount,
            });
        }
        let balance = self.ledger.balance(bidder).await?;
        if balance < amount {
            return Err(CardError::InsufficientFunds {
                balance,
                required: amount,
            });
        }

        auction.record_bid(bidder, amount, now);
        self.store.update_listing(&auction).await?;
        info!(bidder, "Bid {} on {}", amount, auction.collectible_id);
        Ok(auction)
    }

    /// Withdraw the owner's auction; only allowed before the first bid
    #[instrument(skip(self))]
    pub async fn cancel_auction(&self, owner: &str) -> Result<MarketListing> {
        let _gate = self.gate.lock().await;

        let mut auction = self
            .store
            .active_listings(ListingKind::Auction)
            .await?
            .into_iter()
            .find(|l| l.seller == owner)
            .ok_or_else(|| CardError::NoActiveListing(format!("{} has no auction", owner)))?;
        if !auction.bids.is_empty() {
            return Err(CardError::AuctionInProgress(
                "auction already has bids".into(),
            ));
        }

        auction.status = ListingStatus::Cancelled;
        self.store.update_listing(&auction).await?;
        self.unflag(&auction).await?;
        Ok(auction)
    }

    pub async fn active_auction(&self) -> Result<Option<MarketListing>> {
        Ok(self
            .store
            .active_listings(ListingKind::Auction)
            .await?
            .into_iter()
            .next())
    }

    /// Close every auction whose end time has passed
    pub async fn settle_auction(&self, now: DateTime<Utc>) -> Result<Vec<AuctionResult>> {
        let _gate = self.gate.lock().await;
        self.settle_ended(now).await
    }

    async fn settle_ended(&self, now: DateTime<Utc>) -> Result<Vec<AuctionResult>> {
        let ended: Vec<MarketListing> = self
            .store
            .active_listings(ListingKind::Auction)
            .await?
            .into_iter()
            .filter(|l| l.has_ended(now))
            .collect();

        let mut results = Vec::with_capacity(ended.len());
        for listing in ended {
            results.push(self.settle_one(listing).await?);
            Metrics::inc(&self.metrics.auctions_settled);
        }
        Ok(results)
    }

    async fn settle_one(&self, mut listing: MarketListing) -> Result<AuctionResult> {
        let winner = listing.high_bidder.clone().zip(listing.high_bid);
        let copy = self
            .store
            .get_copy(listing.copy_id)
            .await?
            .filter(|c| c.owner == listing.seller);

        if let (Some((winner, price)), Some(mut copy)) = (winner, copy) {
            match self.settle_trade(&mut listing, &mut copy, &winner, price).await {
                Ok(()) => {
                    info!("Auction {} sold to {} for {}", listing.id, winner, price);
                    return Ok(AuctionResult::Sold {
                        listing,
                        winner,
                        price,
                    });
                }
                Err(CardError::InsufficientFunds { balance, required }) => {
                    warn!(
                        "Auction winner {} cannot pay {} (balance {})",
                        winner, required, balance
                    );
                }
                Err(e) => return Err(e),
            }
        }

        listing.status = ListingStatus::Expired;
        self.store.update_listing(&listing).await?;
        self.unflag(&listing).await?;
        info!("Auction {} expired without a sale", listing.id);
        Ok(AuctionResult::Expired { listing })
    }
}

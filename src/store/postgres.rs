use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::DocumentStore;
use crate::domain::{
    Bid, CustomDeck, ListingKind, ListingStatus, MarketListing, OwnedCopy, ScarcityRecord,
};
use crate::error::{CardError, Result};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a PostgreSQL store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn scarcity_from_row(row: &PgRow) -> ScarcityRecord {
    ScarcityRecord {
        collectible_id: row.get("collectible_id"),
        max_copies: row.get::<i32, _>("max_copies") as u32,
        total_spawned: row.get::<i32, _>("total_spawned") as u32,
        unique_owners: row.get::<i32, _>("unique_owners") as u32,
        total_circulation: row.get::<i32, _>("total_circulation") as u32,
        last_trade_price: row.get::<Option<i64>, _>("last_trade_price").map(from_db),
        recent_trades: row
            .get::<Vec<i64>, _>("recent_trades")
            .into_iter()
            .map(from_db)
            .collect(),
        last_spawned_at: row.get("last_spawned_at"),
    }
}

fn copy_from_row(row: &PgRow) -> OwnedCopy {
    OwnedCopy {
        id: row.get("id"),
        owner: row.get("owner"),
        collectible_id: row.get("collectible_id"),
        copy_number: row.get::<i32, _>("copy_number") as u32,
        acquired_at: row.get("acquired_at"),
        deck_slot: row.get::<Option<i16>, _>("deck_slot").map(|s| s as u8),
        custom_deck: row.get("custom_deck"),
        for_sale: row.get("for_sale"),
        sale_price: row.get::<Option<i64>, _>("sale_price").map(from_db),
    }
}

fn listing_from_row(row: &PgRow) -> Result<MarketListing> {
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let bids: Json<Vec<Bid>> = row.get("bids");

    Ok(MarketListing {
        id: row.get("id"),
        copy_id: row.get("copy_id"),
        collectible_id: row.get("collectible_id"),
        seller: row.get("seller"),
        kind: ListingKind::try_from(kind.as_str()).map_err(CardError::Internal)?,
        price: from_db(row.get("price")),
        bids: bids.0,
        high_bid: row.get::<Option<i64>, _>("high_bid").map(from_db),
        high_bidder: row.get("high_bidder"),
        ends_at: row.get("ends_at"),
        status: ListingStatus::try_from(status.as_str()).map_err(CardError::Internal)?,
        created_at: row.get("created_at"),
    })
}

fn deck_from_row(row: &PgRow) -> CustomDeck {
    CustomDeck {
        id: row.get("id"),
        owner: row.get("owner"),
        name: row.get("name"),
        cards: row.get("cards"),
        created_at: row.get("created_at"),
    }
}

const COPY_COLUMNS: &str = "id, owner, collectible_id, copy_number, acquired_at, deck_slot, \
                            custom_deck, for_sale, sale_price";

#[async_trait]
impl DocumentStore for PostgresStore {
    // ==================== Scarcity ====================

    async fn get_scarcity(&self, collectible_id: &str) -> Result<Option<ScarcityRecord>> {
        let row = sqlx::query("SELECT * FROM scarcity_records WHERE collectible_id = $1")
            .bind(collectible_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(scarcity_from_row))
    }

    #[instrument(skip(self))]
    async fn ensure_scarcity(
        &self,
        collectible_id: &str,
        max_copies: u32,
    ) -> Result<ScarcityRecord> {
        sqlx::query(
            r#"
            INSERT INTO scarcity_records (collectible_id, max_copies)
            VALUES ($1, $2)
            ON CONFLICT (collectible_id) DO NOTHING
            "#,
        )
        .bind(collectible_id)
        .bind(max_copies as i32)
        .execute(&self.pool)
        .await?;

        self.get_scarcity(collectible_id)
            .await?
            .ok_or_else(|| CardError::Internal(format!("scarcity upsert lost for {}", collectible_id)))
    }

    async fn reserve_copy(
        &self,
        collectible_id: &str,
        bypass_cap: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        // Cap check and increment in one statement
        let row = sqlx::query(
            r#"
            UPDATE scarcity_records
            SET total_spawned = total_spawned + 1,
                last_spawned_at = $3
            WHERE collectible_id = $1
              AND (total_spawned < max_copies OR $2)
            RETURNING total_spawned
            "#,
        )
        .bind(collectible_id)
        .bind(bypass_cap)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get::<i32, _>("total_spawned") as u32))
    }

    async fn release_copy(&self, collectible_id: &str, copy_number: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scarcity_records
            SET total_spawned = total_spawned - 1
            WHERE collectible_id = $1 AND total_spawned = $2 AND total_spawned > 0
            "#,
        )
        .bind(collectible_id)
        .bind(copy_number as i32)
        .execute(&self.pool)
        .await?;

        let released = result.rows_affected() == 1;
        debug!(
            "Release of copy #{} of {}: {}",
            copy_number, collectible_id, released
        );
        Ok(released)
    }

    async fn record_claim(&self, collectible_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scarcity_records
            SET total_circulation = total_circulation + 1,
                unique_owners = unique_owners + 1
            WHERE collectible_id = $1
            "#,
        )
        .bind(collectible_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn adjust_circulation(&self, collectible_id: &str, delta: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scarcity_records
            SET total_circulation = GREATEST(total_circulation + $2, 0)
            WHERE collectible_id = $1
            "#,
        )
        .bind(collectible_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_trade(&self, collectible_id: &str, price: u64, keep: usize) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scarcity_records
            SET last_trade_price = $2,
                recent_trades = (array_append(recent_trades, $2))
                    [GREATEST(cardinality(recent_trades) + 2 - $3, 1):]
            WHERE collectible_id = $1
            "#,
        )
        .bind(collectible_id)
        .bind(to_db(price))
        .bind(keep as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ==================== Owned copies ====================

    #[instrument(skip(self, copy), fields(copy_id = %copy.id))]
    async fn insert_copy(&self, copy: &OwnedCopy) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO owned_copies
            (id, owner, collectible_id, copy_number, acquired_at, deck_slot,
             custom_deck, for_sale, sale_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(copy.id)
        .bind(&copy.owner)
        .bind(&copy.collectible_id)
        .bind(copy.copy_number as i32)
        .bind(copy.acquired_at)
        .bind(copy.deck_slot.map(i16::from))
        .bind(copy.custom_deck)
        .bind(copy.for_sale)
        .bind(copy.sale_price.map(to_db))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_copy(&self, id: Uuid) -> Result<Option<OwnedCopy>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM owned_copies WHERE id = $1",
            COPY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(copy_from_row))
    }

    async fn update_copy(&self, copy: &OwnedCopy) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE owned_copies
            SET owner = $2,
                deck_slot = $3,
                custom_deck = $4,
                for_sale = $5,
                sale_price = $6
            WHERE id = $1
            "#,
        )
        .bind(copy.id)
        .bind(&copy.owner)
        .bind(copy.deck_slot.map(i16::from))
        .bind(copy.custom_deck)
        .bind(copy.for_sale)
        .bind(copy.sale_price.map(to_db))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CardError::NotFound(format!("copy {}", copy.id)));
        }
        Ok(())
    }

    async fn delete_copy(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM owned_copies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn copies_by_owner(&self, owner: &str) -> Result<Vec<OwnedCopy>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM owned_copies WHERE owner = $1 ORDER BY acquired_at ASC, copy_number ASC",
            COPY_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(copy_from_row).collect())
    }

    async fn owner_counts(&self) -> Result<Vec<(String, u64)>> {
        let rows = sqlx::query(
            "SELECT owner, COUNT(*) AS copies FROM owned_copies GROUP BY owner",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("owner"), from_db(r.get("copies"))))
            .collect())
    }

    // ==================== Listings ====================

    async fn insert_listing(&self, listing: &MarketListing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_listings
            (id, copy_id, collectible_id, seller, kind, price, bids, high_bid,
             high_bidder, ends_at, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(listing.id)
        .bind(listing.copy_id)
        .bind(&listing.collectible_id)
        .bind(&listing.seller)
        .bind(listing.kind.as_str())
        .bind(to_db(listing.price))
        .bind(Json(&listing.bids))
        .bind(listing.high_bid.map(to_db))
        .bind(&listing.high_bidder)
        .bind(listing.ends_at)
        .bind(listing.status.as_str())
        .bind(listing.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_listing(&self, listing: &MarketListing) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE market_listings
            SET price = $2,
                bids = $3,
                high_bid = $4,
                high_bidder = $5,
                ends_at = $6,
                status = $7
            WHERE id = $1
            "#,
        )
        .bind(listing.id)
        .bind(to_db(listing.price))
        .bind(Json(&listing.bids))
        .bind(listing.high_bid.map(to_db))
        .bind(&listing.high_bidder)
        .bind(listing.ends_at)
        .bind(listing.status.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CardError::NotFound(format!("listing {}", listing.id)));
        }
        Ok(())
    }

    async fn active_listings(&self, kind: ListingKind) -> Result<Vec<MarketListing>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM market_listings
            WHERE kind = $1 AND status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(listing_from_row).collect()
    }

    // ==================== Custom decks ====================

    async fn insert_deck(&self, deck: &CustomDeck) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO custom_decks (id, owner, name, cards, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(deck.id)
        .bind(&deck.owner)
        .bind(&deck.name)
        .bind(&deck.cards)
        .bind(deck.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_deck(&self, deck: &CustomDeck) -> Result<()> {
        let result = sqlx::query("UPDATE custom_decks SET name = $2, cards = $3 WHERE id = $1")
            .bind(deck.id)
            .bind(&deck.name)
            .bind(&deck.cards)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CardError::NotFound(format!("deck {}", deck.name)));
        }
        Ok(())
    }

    async fn delete_deck(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM custom_decks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_deck(&self, id: Uuid) -> Result<Option<CustomDeck>> {
        let row = sqlx::query("SELECT * FROM custom_decks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(deck_from_row))
    }

    async fn decks_by_owner(&self, owner: &str) -> Result<Vec<CustomDeck>> {
        let rows =
            sqlx::query("SELECT * FROM custom_decks WHERE owner = $1 ORDER BY created_at ASC")
                .bind(owner)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(deck_from_row).collect())
    }
}

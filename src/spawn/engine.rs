use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::caption::{self, CaptionInput};
use super::open::OpenSpawnTable;
use super::selection::{draw_tier, shuffled};
use crate::adapters::{SpawnMedia, Transport};
use crate::catalog::Catalog;
use crate::config::SpawnConfig;
use crate::domain::{Collectible, OpenSpawn, Tier};
use crate::error::{CardError, Result};
use crate::pricing::{price_of, rarity_of, Rarity};
use crate::services::Metrics;
use crate::store::DocumentStore;

/// What to spawn. The default is a random pick by weighted tier.
#[derive(Debug, Clone, Default)]
pub struct SpawnRequest {
    /// Collectible id or name
    pub collectible: Option<String>,
    /// Draw from this tier instead of rolling one
    pub tier: Option<Tier>,
    /// Reserve even when the collectible is at its cap
    pub bypass_cap: bool,
}

impl SpawnRequest {
    pub fn random() -> Self {
        Self::default()
    }

    pub fn collectible(id_or_name: impl Into<String>) -> Self {
        Self {
            collectible: Some(id_or_name.into()),
            ..Self::default()
        }
    }

    pub fn tier(tier: Tier) -> Self {
        Self {
            tier: Some(tier),
            ..Self::default()
        }
    }

    pub fn bypassing_cap(mut self) -> Self {
        self.bypass_cap = true;
        self
    }
}

/// A spawn that was published and is now open for claims
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub spawn: OpenSpawn,
    pub collectible: Collectible,
    pub rarity: Rarity,
    pub max_copies: u32,
    pub caption: String,
}

/// Candidate order, fixed before any store access so the random source is
/// never held across an await.
enum Plan {
    Explicit(Collectible),
    Pools { tier: Tier, pools: Vec<Vec<String>> },
}

struct Reservation {
    collectible: Collectible,
    copy_number: u32,
    max_copies: u32,
}

pub struct SpawnEngine {
    catalog: Arc<Catalog>,
    store: Arc<dyn DocumentStore>,
    transport: Arc<dyn Transport>,
    metrics: Arc<Metrics>,
    config: SpawnConfig,
}

impl SpawnEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn DocumentStore>,
        transport: Arc<dyn Transport>,
        metrics: Arc<Metrics>,
        config: SpawnConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            transport,
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    pub fn claim_window(&self) -> Duration {
        Duration::seconds(self.config.claim_window_secs as i64)
    }

    /// Select, reserve, publish and open one spawn in `chat_id`.
    ///
    /// The copy number is reserved before publishing. If the publish fails the
    /// reservation is released and nothing is opened.
    #[instrument(skip(self, spawns, request, rng), fields(collectible = ?request.collectible, tier = ?request.tier))]
    pub async fn spawn<R>(
        &self,
        spawns: &OpenSpawnTable,
        chat_id: &str,
        request: &SpawnRequest,
        rng: &mut R,
    ) -> Result<SpawnOutcome>
    where
        R: Rng + Send + ?Sized,
    {
        let plan = self.plan(request, rng)?;
        let reservation = self.reserve(spawns, plan, request.bypass_cap).await?;
        self.publish(spawns, chat_id, reservation).await
    }

    fn plan<R: Rng + ?Sized>(&self, request: &SpawnRequest, rng: &mut R) -> Result<Plan> {
        if let Some(wanted) = request.collectible.as_deref() {
            let collectible = self
                .catalog
                .resolve(wanted)
                .ok_or_else(|| CardError::NotFound(format!("collectible {}", wanted)))?;
            return Ok(Plan::Explicit(collectible.clone()));
        }

        let tier = request.tier.unwrap_or_else(|| {
            draw_tier(rng, &self.config.tier_weights, self.config.s_tier_chance)
        });
        let mut pools = vec![shuffled(rng, self.catalog.tier_ids(tier))];
        if tier != Tier::lowest() {
            pools.push(shuffled(rng, self.catalog.tier_ids(Tier::lowest())));
        }
        Ok(Plan::Pools { tier, pools })
    }

    async fn reserve(
        &self,
        spawns: &OpenSpawnTable,
        plan: Plan,
        bypass_cap: bool,
    ) -> Result<Reservation> {
        let now = Utc::now();
        match plan {
            Plan::Explicit(collectible) => {
                let record = self
                    .store
                    .ensure_scarcity(&collectible.id, collectible.tier.max_copies())
                    .await?;
                let copy_number = self
                    .store
                    .reserve_copy(&collectible.id, bypass_cap, now)
                    .await?
                    .ok_or_else(|| {
                        CardError::CapacityExceeded(format!(
                            "{} has spawned all {} copies",
                            collectible.id, record.max_copies
                        ))
                    })?;
                if spawns.contains(&collectible.id) {
                    warn!(
                        "Explicit spawn of {} replaces an open spawn",
                        collectible.id
                    );
                }
                Ok(Reservation {
                    max_copies: record.max_copies,
                    collectible,
                    copy_number,
                })
            }
            Plan::Pools { tier, pools } => {
                for id in pools.iter().flatten() {
                    if spawns.contains(id) {
                        continue;
                    }
                    let Some(collectible) = self.catalog.get(id) else {
                        continue;
                    };
                    let record = self
                        .store
                        .ensure_scarcity(id, collectible.tier.max_copies())
                        .await?;
                    if !bypass_cap && !record.has_capacity() {
                        continue;
                    }
                    // a concurrent spawn may take the last slot between the check and here
                    if let Some(copy_number) = self.store.reserve_copy(id, bypass_cap, now).await? {
                        return Ok(Reservation {
                            collectible: collectible.clone(),
                            copy_number,
                            max_copies: record.max_copies,
                        });
                    }
                }
                Err(CardError::NoSpawnableCollectible(format!(
                    "tier {} and tier {} are exhausted",
                    tier,
                    Tier::lowest()
                )))
            }
        }
    }

    async fn publish(
        &self,
        spawns: &OpenSpawnTable,
        chat_id: &str,
        reservation: Reservation,
    ) -> Result<SpawnOutcome> {
        let Reservation {
            collectible,
            copy_number,
            max_copies,
        } = reservation;

        let price = price_of(collectible.tier, copy_number, max_copies);
        let rarity = rarity_of(copy_number, max_copies);
        let caption = caption::render(&CaptionInput {
            collectible: &collectible,
            rarity,
            copy_number,
            max_copies,
            price,
            claim_command: &self.config.claim_command,
            claim_window_mins: (self.config.claim_window_secs / 60).max(1),
        });
        let media = SpawnMedia {
            image: collectible.image.clone(),
            caption: caption.clone(),
        };

        if let Err(e) = self.transport.publish(chat_id, media).await {
            Metrics::inc(&self.metrics.publish_failures);
            match self.store.release_copy(&collectible.id, copy_number).await {
                Ok(true) => debug!("Released copy #{} of {}", copy_number, collectible.id),
                Ok(false) => warn!(
                    "Copy #{} of {} not released, a later reservation already exists",
                    copy_number, collectible.id
                ),
                Err(release_err) => warn!(
                    "Failed to release copy #{} of {}: {}",
                    copy_number, collectible.id, release_err
                ),
            }
            warn!(chat_id, "Publish of {} failed: {}", collectible.id, e);
            let reason = match e {
                CardError::PublishFailed(reason) => reason,
                other => other.to_string(),
            };
            return Err(CardError::PublishFailed(reason));
        }

        let now = Utc::now();
        let spawn = OpenSpawn {
            collectible_id: collectible.id.clone(),
            copy_number,
            price,
            chat_id: chat_id.to_string(),
            created_at: now,
            expires_at: now + self.claim_window(),
        };
        spawns.insert(spawn.clone());
        Metrics::inc(&self.metrics.spawns_published);
        info!(
            chat_id,
            "Spawned {} ({}) copy #{}/{} at {} coins",
            collectible.id,
            rarity,
            copy_number,
            max_copies,
            price
        );

        Ok(SpawnOutcome {
            spawn,
            collectible,
            rarity,
            max_copies,
            caption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockTransport, RecordingTransport};
    use crate::catalog::tests::card;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from_entries(vec![
            card("1-00001", Tier::One, "Acorn Sprite", "Forest"),
            card("1-00002", Tier::One, "Moss Golem", "Forest"),
            card("6-00001", Tier::Six, "Storm Titan", "Sky"),
        ]))
    }

    fn engine(store: Arc<MemoryStore>, transport: Arc<dyn Transport>) -> SpawnEngine {
        SpawnEngine::new(
            catalog(),
            store,
            transport,
            Arc::new(Metrics::new()),
            SpawnConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_explicit_spawn_opens_claim_window() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let engine = engine(store.clone(), transport.clone());
        let spawns = OpenSpawnTable::new();
        let mut rng = StdRng::seed_from_u64(1);

        let outcome = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::collectible("storm titan"), &mut rng)
            .await
            .unwrap();

        assert_eq!(outcome.spawn.collectible_id, "6-00001");
        assert_eq!(outcome.spawn.copy_number, 1);
        assert_eq!(outcome.rarity, Rarity::Mythic);
        // 15 / 1 * 5000
        assert_eq!(outcome.spawn.price, 75_000);
        assert_eq!(
            outcome.spawn.expires_at - outcome.spawn.created_at,
            Duration::seconds(300)
        );
        assert!(spawns.contains("6-00001"));
        assert_eq!(transport.published_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_collectible() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store, Arc::new(RecordingTransport::new()));
        let mut rng = StdRng::seed_from_u64(1);
        let err = engine
            .spawn(
                &OpenSpawnTable::new(),
                "chat-1",
                &SpawnRequest::collectible("9-99999"),
                &mut rng,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_publish_failure_releases_reservation() {
        let store = Arc::new(MemoryStore::new());
        let mut transport = MockTransport::new();
        transport
            .expect_publish()
            .times(1)
            .returning(|_, _| Err(CardError::PublishFailed("upload timed out".into())));
        let engine = engine(store.clone(), Arc::new(transport));
        let spawns = OpenSpawnTable::new();
        let mut rng = StdRng::seed_from_u64(1);

        let err = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::collectible("1-00001"), &mut rng)
            .await
            .unwrap_err();

        assert!(matches!(err, CardError::PublishFailed(ref m) if m == "upload timed out"));
        let record = store.get_scarcity("1-00001").await.unwrap().unwrap();
        assert_eq!(record.total_spawned, 0);
        assert!(spawns.is_empty());
        assert_eq!(engine.metrics.snapshot().publish_failures, 1);
    }

    #[tokio::test]
    async fn test_random_spawn_skips_open_and_falls_back() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone(), Arc::new(RecordingTransport::new()));
        let spawns = OpenSpawnTable::new();
        let mut rng = StdRng::seed_from_u64(11);

        // exhaust the only tier-6 card
        store.ensure_scarcity("6-00001", 15).await.unwrap();
        for _ in 0..15 {
            store.reserve_copy("6-00001", false, Utc::now()).await.unwrap();
        }

        let first = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::tier(Tier::Six), &mut rng)
            .await
            .unwrap();
        assert_eq!(first.collectible.tier, Tier::One);

        let second = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::tier(Tier::Six), &mut rng)
            .await
            .unwrap();
        assert_eq!(second.collectible.tier, Tier::One);
        assert_ne!(first.collectible.id, second.collectible.id);

        // both tier-1 cards are open now
        let err = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::tier(Tier::Six), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, CardError::NoSpawnableCollectible(_)));
    }

    #[tokio::test]
    async fn test_capped_explicit_spawn_and_bypass() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone(), Arc::new(RecordingTransport::new()));
        let spawns = OpenSpawnTable::new();
        let mut rng = StdRng::seed_from_u64(2);

        store.ensure_scarcity("6-00001", 15).await.unwrap();
        for _ in 0..15 {
            store.reserve_copy("6-00001", false, Utc::now()).await.unwrap();
        }

        let err = engine
            .spawn(&spawns, "chat-1", &SpawnRequest::collectible("6-00001"), &mut rng)
            .await
            .unwrap_err();
        assert!(matches!(err, CardError::CapacityExceeded(_)));

        let forced = engine
            .spawn(
                &spawns,
                "chat-1",
                &SpawnRequest::collectible("6-00001").bypassing_cap(),
                &mut rng,
            )
            .await
            .unwrap();
        assert_eq!(forced.spawn.copy_number, 16);
        // price is floored at base once over the cap
        assert_eq!(forced.spawn.price, Tier::Six.base_price());
    }
}

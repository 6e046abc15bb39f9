use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::roles::{Caller, Role, RoleSet};
use super::timer::SpawnTimer;
use crate::config::TenantConfig;
use crate::domain::OpenSpawn;
use crate::error::{CardError, Result};
use crate::ownership::Claimed;
use crate::services::{CardServices, Metrics};
use crate::spawn::caption::claim_reply;
use crate::spawn::{OpenSpawnTable, SpawnOutcome, SpawnRequest};

/// State of one bot identity: which chats get spawns, the spawn timer, roles
/// and the table of open spawns.
pub struct TenantRuntime {
    id: String,
    services: Arc<CardServices>,
    spawns: Arc<OpenSpawnTable>,
    chats: Arc<RwLock<BTreeSet<String>>>,
    roles: RwLock<RoleSet>,
    timer: Mutex<Option<SpawnTimer>>,
    period: Duration,
}

impl TenantRuntime {
    pub fn new(id: impl Into<String>, services: Arc<CardServices>, roles: RoleSet) -> Self {
        let period = Duration::from_secs(services.engine.config().interval_secs.max(1));
        Self {
            id: id.into(),
            services,
            spawns: Arc::new(OpenSpawnTable::new()),
            chats: Arc::new(RwLock::new(BTreeSet::new())),
            roles: RwLock::new(roles),
            timer: Mutex::new(None),
            period,
        }
    }

    /// Build from config and enable its startup chats
    pub async fn from_config(config: &TenantConfig, services: Arc<CardServices>) -> Self {
        let runtime = Self::new(config.id.clone(), services, RoleSet::from_config(config));
        for chat in &config.chats {
            runtime.activate(chat).await;
        }
        runtime
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn services(&self) -> &Arc<CardServices> {
        &self.services
    }

    // ==================== Spawning control ====================

    /// Enable spawning in a chat. Returns false if it was already enabled.
    pub async fn enable_chat(&self, caller: &Caller, chat_id: &str) -> Result<bool> {
        self.require_chat_moderator(caller).await?;
        Ok(self.activate(chat_id).await)
    }

    /// Disable spawning in a chat. Returns false if it was not enabled.
    pub async fn disable_chat(&self, caller: &Caller, chat_id: &str) -> Result<bool> {
        self.require_chat_moderator(caller).await?;
        Ok(self.deactivate(chat_id).await)
    }

    /// Flip spawning for a chat; returns the new state
    pub async fn toggle_spawning(&self, caller: &Caller, chat_id: &str) -> Result<bool> {
        self.require_chat_moderator(caller).await?;
        if self.is_enabled(chat_id).await {
            self.deactivate(chat_id).await;
            Ok(false)
        } else {
            self.activate(chat_id).await;
            Ok(true)
        }
    }

    pub async fn is_enabled(&self, chat_id: &str) -> bool {
        self.chats.read().await.contains(chat_id)
    }

    pub async fn enabled_chats(&self) -> Vec<String> {
        self.chats.read().await.iter().cloned().collect()
    }

    pub async fn timer_running(&self) -> bool {
        self.timer
            .lock()
            .await
            .as_ref()
            .map(SpawnTimer::is_running)
            .unwrap_or(false)
    }

    async fn activate(&self, chat_id: &str) -> bool {
        let mut timer = self.timer.lock().await;
        let added = self.chats.write().await.insert(chat_id.to_string());
        if added {
            info!(tenant = %self.id, chat_id, "Spawning enabled");
        }
        if timer.is_none() {
            *timer = Some(SpawnTimer::start(
                self.id.clone(),
                self.services.engine.clone(),
                self.spawns.clone(),
                self.chats.clone(),
                self.period,
            ));
        }
        added
    }

    async fn deactivate(&self, chat_id: &str) -> bool {
        let mut timer = self.timer.lock().await;
        let mut chats = self.chats.write().await;
        let removed = chats.remove(chat_id);
        if removed {
            info!(tenant = %self.id, chat_id, "Spawning disabled");
        }
        if chats.is_empty() {
            if let Some(running) = timer.take() {
                running.stop();
                info!(tenant = %self.id, "Spawn timer stopped, no chats enabled");
            }
        }
        removed
    }

    /// Stop the timer without touching the enabled chats, waiting for any
    /// in-flight spawn to finish
    pub async fn shutdown(&self) {
        let running = self.timer.lock().await.take();
        if let Some(running) = running {
            running.stop_and_wait().await;
        }
    }

    // ==================== Commands ====================

    /// Force a spawn in a chat (bot owners and admins only)
    pub async fn manual_spawn(
        &self,
        caller: &Caller,
        chat_id: &str,
        request: &SpawnRequest,
    ) -> Result<SpawnOutcome> {
        if !self.roles.read().await.has_at_least(&caller.id, Role::Admin) {
            return Err(CardError::Unauthorized(
                "only bot owners and admins can spawn cards".into(),
            ));
        }
        let mut rng = StdRng::from_entropy();
        self.services
            .engine
            .spawn(&self.spawns, chat_id, request, &mut rng)
            .await
    }

    /// Claim an open spawn and announce the catch in the chat it appeared in.
    /// A failed announcement does not undo the claim.
    pub async fn claim(&self, collectible_id: &str, claimant: &str) -> Result<Claimed> {
        let claimed = self
            .services
            .ownership
            .claim(&self.spawns, collectible_id, claimant)
            .await?;

        let text = claim_reply(claimant, &claimed.view, claimed.first_copy_for_owner);
        if let Err(e) = self.services.transport.reply(&claimed.chat_id, &text).await {
            warn!(tenant = %self.id, chat_id = %claimed.chat_id, "Claim announcement failed: {}", e);
        }
        Ok(claimed)
    }

    pub fn open_spawns(&self) -> Vec<OpenSpawn> {
        self.spawns.snapshot()
    }

    /// The open-spawn table, for callers that drive the engine directly
    pub fn spawn_table(&self) -> &OpenSpawnTable {
        &self.spawns
    }

    /// Drop expired open spawns; returns how many were dropped
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let expired = self.spawns.sweep_expired(now);
        if !expired.is_empty() {
            Metrics::add(&self.services.metrics.spawns_expired, expired.len() as u64);
            for spawn in &expired {
                debug!(
                    tenant = %self.id,
                    "Spawn of {} copy #{} expired unclaimed",
                    spawn.collectible_id,
                    spawn.copy_number
                );
            }
        }
        expired.len()
    }

    // ==================== Roles ====================

    pub async fn grant_role(&self, caller: &Caller, user: &str, role: Role) -> Result<()> {
        self.require_owner(caller).await?;
        self.roles.write().await.grant(user, role);
        Ok(())
    }

    pub async fn revoke_role(&self, caller: &Caller, user: &str) -> Result<Option<Role>> {
        self.require_owner(caller).await?;
        Ok(self.roles.write().await.revoke(user))
    }

    pub async fn role_of(&self, user: &str) -> Option<Role> {
        self.roles.read().await.role_of(user)
    }

    async fn require_owner(&self, caller: &Caller) -> Result<()> {
        if self.roles.read().await.has_at_least(&caller.id, Role::Owner) {
            Ok(())
        } else {
            Err(CardError::Unauthorized("only bot owners can manage roles".into()))
        }
    }

    async fn require_chat_moderator(&self, caller: &Caller) -> Result<()> {
        if caller.is_chat_admin || self.roles.read().await.has_at_least(&caller.id, Role::Moderator) {
            Ok(())
        } else {
            Err(CardError::Unauthorized(
                "only chat admins and bot moderators can change spawning".into(),
            ))
        }
    }
}

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::runtime::TenantRuntime;
use crate::config::TenantConfig;
use crate::market::AuctionResult;
use crate::services::CardServices;

/// What one sweep pass did
#[derive(Debug, Default)]
pub struct SweepReport {
    pub expired_spawns: usize,
    pub auctions: Vec<AuctionResult>,
}

type TenantMap = DashMap<String, Arc<TenantRuntime>>;

struct Sweeper {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// All tenants served by this process plus the shared background sweep
pub struct TenantRegistry {
    services: Arc<CardServices>,
    tenants: Arc<TenantMap>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl TenantRegistry {
    pub fn new(services: Arc<CardServices>) -> Self {
        Self {
            services,
            tenants: Arc::new(DashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub async fn from_config(configs: &[TenantConfig], services: Arc<CardServices>) -> Self {
        let registry = Self::new(services);
        for config in configs {
            let runtime = TenantRuntime::from_config(config, registry.services.clone()).await;
            info!(
                tenant = %config.id,
                "Tenant ready ({} chat(s) enabled)",
                config.chats.len()
            );
            registry.insert(runtime);
        }
        registry
    }

    /// Register a tenant. A running sweeper picks it up on its next tick.
    pub fn insert(&self, runtime: TenantRuntime) -> Arc<TenantRuntime> {
        let runtime = Arc::new(runtime);
        self.tenants.insert(runtime.id().to_string(), runtime.clone());
        runtime
    }

    pub fn get(&self, tenant_id: &str) -> Option<Arc<TenantRuntime>> {
        self.tenants.get(tenant_id).map(|t| t.value().clone())
    }

    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tenants.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn services(&self) -> &Arc<CardServices> {
        &self.services
    }

    /// One pass: expire open spawns in every tenant, then settle ended auctions
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SweepReport {
        sweep(&self.services, &self.tenants, now).await
    }

    /// Run [`TenantRegistry::sweep_once`] every `period` until shutdown
    pub async fn start_sweeper(&self, period: Duration) {
        let mut slot = self.sweeper.lock().await;
        if slot.is_some() {
            return;
        }

        let services = self.services.clone();
        let tenants = self.tenants.clone();
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        info!("Starting sweeper every {}s", period.as_secs());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                let report = sweep(&services, &tenants, Utc::now()).await;
                if report.expired_spawns > 0 || !report.auctions.is_empty() {
                    debug!(
                        "Sweep expired {} spawn(s), settled {} auction(s)",
                        report.expired_spawns,
                        report.auctions.len()
                    );
                }
            }
        });

        *slot = Some(Sweeper { handle, shutdown });
    }

    /// Stop the sweeper and every tenant timer, letting in-flight work finish
    pub async fn shutdown(&self) {
        let sweeper = self.sweeper.lock().await.take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.shutdown.send(true);
            if let Err(e) = sweeper.handle.await {
                warn!("Sweeper task ended abnormally: {}", e);
            }
        }
        let tenants: Vec<Arc<TenantRuntime>> =
            self.tenants.iter().map(|t| t.value().clone()).collect();
        for tenant in tenants {
            tenant.shutdown().await;
        }
        info!("Tenants stopped. {}", self.services.metrics.summary());
    }
}

async fn sweep(services: &CardServices, tenants: &TenantMap, now: DateTime<Utc>) -> SweepReport {
    // current membership, so tenants registered after startup are covered
    let expired_spawns = tenants.iter().map(|t| t.value().sweep(now)).sum();
    let auctions = match services.market.settle_auction(now).await {
        Ok(results) => results,
        Err(e) => {
            warn!("Auction settlement failed: {}", e);
            Vec::new()
        }
    };
    SweepReport {
        expired_spawns,
        auctions,
    }
}

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::spawn::{OpenSpawnTable, SpawnEngine, SpawnRequest};

/// Recurring spawn task of one tenant.
///
/// Stopping is cooperative: a spawn already in flight runs to completion (or
/// rolls its reservation back) before the loop exits. Dropping the timer
/// signals the same stop.
pub struct SpawnTimer {
    handle: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl SpawnTimer {
    /// Spawn once per enabled chat every `period`, first tick one period from now
    pub fn start(
        tenant_id: String,
        engine: Arc<SpawnEngine>,
        spawns: Arc<OpenSpawnTable>,
        chats: Arc<RwLock<BTreeSet<String>>>,
        period: Duration,
    ) -> Self {
        info!(tenant = %tenant_id, "Starting spawn timer ({}s)", period.as_secs());
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                let targets: Vec<String> = chats.read().await.iter().cloned().collect();
                debug!(tenant = %tenant_id, "Spawn tick for {} chat(s)", targets.len());

                for chat_id in targets {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    let request = SpawnRequest::random();
                    if let Err(e) = engine.spawn(&spawns, &chat_id, &request, &mut rng).await {
                        warn!(tenant = %tenant_id, chat_id = %chat_id, "Scheduled spawn failed: {}", e);
                    }
                }
            }

            debug!(tenant = %tenant_id, "Spawn timer loop exited");
        });

        Self {
            handle: Some(handle),
            shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop after any in-flight spawn
    pub fn stop(self) {
        let _ = self.shutdown.send(true);
    }

    /// Signal the loop and wait until it has exited
    pub async fn stop_and_wait(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Spawn timer task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SpawnTimer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

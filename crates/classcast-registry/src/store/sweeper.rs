use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::store::SessionRegistry;

/// Periodic expiry pass over the registry, independent of client traffic.
pub struct Sweeper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// One pass at the registry clock's current instant.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.registry.sweep_expired(self.registry.now());
        if evicted > 0 {
            info!("Cleaned up {} expired sessions", evicted);
        } else {
            debug!(active = self.registry.len(), "sweep found nothing to evict");
        }
        evicted
    }

    pub async fn run(self: Arc<Self>) {
        info!("Expiry sweeper started (interval {:?})", self.interval);
        loop {
            sleep(self.interval).await;
            self.sweep_once();
        }
    }

    /// Spawns `run` on the current runtime. Abort the handle to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        let sweeper = Arc::new(self);
        tokio::spawn(async move {
            sweeper.run().await;
        })
    }
}

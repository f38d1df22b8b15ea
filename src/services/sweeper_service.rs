use std::time::Duration;

use crate::error::Result;
use crate::services::broadcast_service::Broadcaster;
use crate::services::lifecycle_service::AttemptLifecycle;

/// Background safety net for timed attempts. The lifecycle already expires
/// attempts lazily when they are touched; the sweeper catches the ones
/// nobody touches again. Each tick also reclaims broadcast channels whose
/// last watcher has disconnected.
pub struct ExpirySweeper {
    lifecycle: AttemptLifecycle,
    broadcaster: Broadcaster,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(lifecycle: AttemptLifecycle, broadcaster: Broadcaster, interval: Duration) -> Self {
        Self {
            lifecycle,
            broadcaster,
            interval,
        }
    }

    pub async fn run_once(&self) -> Result<usize> {
        let expired = self.lifecycle.sweep_expired().await?;
        let pruned = self.broadcaster.prune_idle();
        if pruned > 0 {
            tracing::debug!("Reclaimed {} idle broadcast channel(s)", pruned);
        }
        Ok(expired)
    }

    pub async fn run(self) {
        tracing::info!(
            "Expiry sweeper running every {} second(s)",
            self.interval.as_secs()
        );
        loop {
            match self.run_once().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("Expiry sweep timed out {} attempt(s)", n),
                Err(e) => tracing::error!("Expiry sweep failed: {:?}", e),
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

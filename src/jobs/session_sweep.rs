//! Expired-session sweeper.
//!
//! Registries already treat expired sessions as absent; the sweep only
//! reclaims their memory. Failures are logged and the next tick tries again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::infra::{SessionRegistry, StorePolicy};

/// Handle to a running sweeper.
pub struct SessionSweeper {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionSweeper {
    /// Start sweeping every `interval`. The first sweep happens one
    /// interval after start.
    pub fn spawn(
        sessions: Arc<dyn SessionRegistry>,
        policy: StorePolicy,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; skip that tick
            ticker.tick().await;

            tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => sweep(sessions.as_ref(), &policy).await,
                    _ = stop.changed() => break,
                }
            }

            tracing::info!("Session sweeper stopped");
        });

        Self { shutdown, task }
    }

    /// Stop the sweeper and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session sweeper task failed");
        }
    }
}

/// Run one sweep.
pub async fn sweep(sessions: &dyn SessionRegistry, policy: &StorePolicy) {
    match policy
        .run("sessions.purge_expired", || sessions.purge_expired())
        .await
    {
        Ok(0) => tracing::debug!("Session sweep found nothing to purge"),
        Ok(purged) => tracing::info!(purged, "Session sweep purged expired sessions"),
        Err(e) => tracing::error!(error = %e, "Session sweep failed"),
    }
}

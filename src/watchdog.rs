//! Vigilante de runs colgados: cada `interval` marca `failed` los runs que
//! llevan más de `stall_timeout` en `running` sin actividad.
use std::sync::Arc;
use std::time::Duration;

use advisor_core::RunLifecycleManager;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub fn spawn_watchdog(manager: Arc<RunLifecycleManager>, interval: Duration, stall_timeout: Duration) -> JoinHandle<()> {
    let max_idle = chrono::Duration::from_std(stall_timeout).unwrap_or_else(|_| chrono::Duration::days(365));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep(&manager, max_idle).await;
        }
    })
}

/// Una pasada del vigilante. Devuelve cuántos runs se marcaron `failed`.
pub async fn sweep(manager: &RunLifecycleManager, max_idle: chrono::Duration) -> usize {
    match manager.reap_stalled_runs(max_idle).await {
        Ok(reaped) => {
            if !reaped.is_empty() {
                info!(count = reaped.len(), runs = ?reaped, "stalled runs marked failed");
            }
            reaped.len()
        }
        Err(e) => {
            warn!(error = %e, "watchdog sweep failed");
            0
        }
    }
}

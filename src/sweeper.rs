use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;
use crate::store::Store;

/// Background task that periodically moves lapsed pending requests to
/// `expired`. Runs forever; spawn it and keep the handle if you want to
/// stop it.
pub async fn run_sweeper<S: Store>(engine: Arc<Engine<S>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let now = crate::times::local_now();
        match engine.expire_lapsed_requests(now).await {
            Ok(expired) if !expired.is_empty() => {
                info!(count = expired.len(), "swept lapsed requests");
            }
            Ok(_) => {}
            Err(e) => {
                // Transient store trouble; the next tick retries.
                warn!("sweep failed: {e}");
            }
        }
    }
}

use std::time::Duration;

use textbin_api::state::AppState;
use tracing::{info, warn};

/// Background task that hard-deletes expired texts (and, by cascade, their
/// likes and comments). Reads already hide them; this reclaims their slugs.
pub async fn run_cleanup_loop(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        match state.service.purge_expired().await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: purged {} expired texts", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}

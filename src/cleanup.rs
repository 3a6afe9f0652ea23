use std::time::Duration;

use tokio::time;

use crate::constants::CLEANUP_INTERVAL_SECS;
use crate::AppState;

/// Background task deleting expired snippets and sessions.
///
/// Reads already filter out expired rows, so this loop only reclaims space;
/// a missed tick never serves stale data.
pub async fn start_cleanup_task(state: AppState) -> anyhow::Result<()> {
    let mut interval = time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

    tracing::info!("Starting cleanup task (runs every hour)");

    loop {
        interval.tick().await;

        match state.db.delete_expired_snippets().await {
            Ok(count) if count > 0 => tracing::info!("Removed {} expired snippets", count),
            Ok(_) => {}
            Err(e) => tracing::error!("Snippet cleanup failed: {}", e),
        }

        match state.db.delete_expired_sessions().await {
            Ok(count) if count > 0 => tracing::info!("Removed {} expired sessions", count),
            Ok(_) => {}
            Err(e) => tracing::error!("Session cleanup failed: {}", e),
        }
    }
}

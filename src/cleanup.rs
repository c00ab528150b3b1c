//! Scheduled cleanup of stale refresh token rows.

use std::time::Duration;

use tracing::{error, info};

use crate::db::Database;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run the cleanup once. A row whose last rotation is older than the
/// refresh lifetime belongs to a token that can no longer verify, so
/// the record only wastes space.
pub async fn run_cleanup(db: &Database, refresh_ttl: Duration) {
    let Ok(now) = crate::jwt::unix_now() else {
        error!("Skipping refresh token cleanup: system clock error");
        return;
    };
    let cutoff = now.saturating_sub(refresh_ttl.as_secs()) as i64;

    match db.refresh_tokens().delete_stale(cutoff).await {
        Ok(count) if count > 0 => info!("Cleaned up {} stale refresh tokens", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up stale refresh tokens: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database, refresh_ttl: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db, refresh_ttl).await;
        }
    })
}

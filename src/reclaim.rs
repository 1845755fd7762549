//! TTL-based reclamation of artifact directories. The loop never exits;
//! every filesystem error is logged and skipped.

use std::{io, path::Path, sync::Arc, time::Duration};

use tokio::fs;
use tracing::{debug, error, info};

use crate::{config::Config, metrics::Metrics};

/// Periodically delete artifact directories whose mtime exceeds the TTL.
/// The first sweep runs immediately at startup.
pub async fn reclaim_loop(config: Arc<Config>, metrics: Arc<Metrics>) {
    let Some(ttl) = config.artifact_ttl() else {
        info!("artifact reclamation disabled");
        return;
    };
    let dir = config.artifacts_path();
    let mut interval = tokio::time::interval(config.cleanup_interval());

    loop {
        interval.tick().await;
        match sweep(&dir, ttl).await {
            Ok(0) => {}
            Ok(removed) => {
                metrics.artifacts_reclaimed.inc_by(removed);
                debug!("removed {removed} expired artifact directory(s)");
            }
            Err(err) => error!("artifact sweep failed: {err:#}"),
        }
    }
}

/// Delete every direct child directory of `dir` older than `ttl`. Returns
/// the number of directories removed.
pub async fn sweep(dir: &Path, ttl: Duration) -> io::Result<u64> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Ok(meta) = fs::metadata(&path).await else {
            continue;
        };
        if !meta.is_dir() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        // A directory being actively written has a fresh mtime and cannot
        // expire; a negative elapsed (mtime in the future) never expires.
        let expired = modified.elapsed().map(|age| age > ttl).unwrap_or(false);
        if !expired {
            continue;
        }
        match fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(err) => error!(
                "failed to remove expired artifact directory {}: {err}",
                path.display()
            ),
        }
    }
    Ok(removed)
}

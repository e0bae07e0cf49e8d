pub mod habits;
pub mod insights;
pub mod notes;

use anyhow::{Context, Result};
use std::time::Duration;

use dayjot::cache::SyncOutcome;
use dayjot::config::DayjotConfig;
use dayjot::store::LocalStore;

/// Open the journal database named by the config.
pub async fn open_store(config: &DayjotConfig) -> Result<LocalStore> {
    let db_path = config.resolved_db_path();
    let store = LocalStore::open_path(&db_path);
    store
        .initialize()
        .await
        .with_context(|| format!("journal database unavailable at {}", db_path.display()))?;
    Ok(store)
}

/// Best-effort connectivity check: any HTTP answer from the insight host counts.
pub async fn is_online(config: &DayjotConfig) -> bool {
    let Ok(client) = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    else {
        return false;
    };
    match client.head(&config.insights.endpoint).send().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "connectivity probe failed");
            false
        }
    }
}

/// Run the deferred sync hook for `tag`.
pub async fn sync(config: &DayjotConfig, tag: &str) -> Result<()> {
    let proxy = dayjot::server::build_proxy(config)?;
    match proxy.sync(tag).await {
        SyncOutcome::Handled => println!("Sync task '{tag}' ran (no remote configured, nothing pushed)."),
        SyncOutcome::Ignored => println!("No sync task named '{tag}'."),
    }
    Ok(())
}

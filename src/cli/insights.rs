//! CLI `insights` command.

use anyhow::Result;

use dayjot::config::DayjotConfig;
use dayjot::insights::{GeminiInsightClient, InsightGenerator};
use dayjot::store::Note;

/// Ask the remote model about the most recent notes and print the result.
pub async fn insights(config: &DayjotConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let notes: Vec<Note> = store.list_all().await?;
    if notes.is_empty() {
        println!("Write a few notes first.");
        return Ok(());
    }

    let client = GeminiInsightClient::new(&config.insights, DayjotConfig::insights_api_key())?;
    let insight = client.generate(&notes).await?;

    println!("Summary");
    println!("{}", "=".repeat(40));
    println!("{}", insight.summary);
    println!();
    println!("Suggestions");
    for (i, suggestion) in insight.suggestions.iter().enumerate() {
        println!("  {}. {suggestion}", i + 1);
    }
    Ok(())
}

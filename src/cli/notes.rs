//! CLI `note` commands.

use anyhow::Result;

use dayjot::config::DayjotConfig;
use dayjot::store::{sort_newest_first, Collection, Note};

/// Write a new note, flagged with the current network state.
pub async fn add(config: &DayjotConfig, title: &str, content: &str) -> Result<()> {
    let store = super::open_store(config).await?;
    let synced = super::is_online(config).await;

    let note = Note::new(title, content, synced);
    store.put(&note).await?;

    println!("Saved note {}", note.id);
    if !synced {
        println!("(offline: saved locally only)");
    }
    Ok(())
}

/// Print every note, newest first.
pub async fn list(config: &DayjotConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let mut notes: Vec<Note> = store.list_all().await?;
    sort_newest_first(&mut notes);

    if notes.is_empty() {
        println!("No notes yet.");
        return Ok(());
    }

    for note in &notes {
        let when = chrono::DateTime::from_timestamp_millis(note.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| note.created_at.to_string());
        println!("{}  {}  {}", note.id, when, note.title);
        if !note.content.is_empty() {
            println!("    {}", note.content.replace('\n', "\n    "));
        }
    }
    Ok(())
}

pub async fn remove(config: &DayjotConfig, id: &str) -> Result<()> {
    let store = super::open_store(config).await?;
    store.delete(Collection::Notes, id).await?;
    println!("Deleted note {id}");
    Ok(())
}

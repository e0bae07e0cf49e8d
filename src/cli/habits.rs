//! CLI `habit` commands.

use anyhow::{Context, Result};
use chrono::NaiveDate;

use dayjot::config::DayjotConfig;
use dayjot::store::{Collection, Habit};

pub async fn add(config: &DayjotConfig, name: &str) -> Result<()> {
    let store = super::open_store(config).await?;
    let habit = Habit::new(name);
    store.put(&habit).await?;
    println!("Tracking habit {} ({})", habit.name, habit.id);
    Ok(())
}

/// Flip completion of `day` (today by default) and store the whole record back.
pub async fn toggle(config: &DayjotConfig, id: &str, day: Option<NaiveDate>) -> Result<()> {
    let store = super::open_store(config).await?;
    let mut habit: Habit = store
        .get(id)
        .await?
        .with_context(|| format!("habit not found: {id}"))?;

    let day = day.unwrap_or_else(|| chrono::Local::now().date_naive());
    let completed = habit.toggle_day(day);
    store.put(&habit).await?;

    let verb = if completed { "Completed" } else { "Unmarked" };
    println!("{verb} {} on {day} (streak: {})", habit.name, habit.streak());
    Ok(())
}

pub async fn list(config: &DayjotConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let mut habits: Vec<Habit> = store.list_all().await?;
    habits.sort_by(|a, b| a.name.cmp(&b.name));

    if habits.is_empty() {
        println!("No habits yet.");
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    for habit in &habits {
        let mark = if habit.is_completed_on(today) { "x" } else { " " };
        println!("[{mark}] {:<24} streak {:>3}  {}", habit.name, habit.streak(), habit.id);
    }
    Ok(())
}

pub async fn remove(config: &DayjotConfig, id: &str) -> Result<()> {
    let store = super::open_store(config).await?;
    store.delete(Collection::Habits, id).await?;
    println!("Deleted habit {id}");
    Ok(())
}

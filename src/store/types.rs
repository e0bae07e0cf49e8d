//! Record types for the two collections.
//!
//! [`Note`] is a journal entry and [`Habit`] a recurring activity. Both are
//! stored as JSON payloads keyed by `id`, using the camelCase field names of
//! the browser records they replace.

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeSet;

/// The two independently keyed collections in the journal database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Notes,
    Habits,
}

impl Collection {
    /// Table name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::Habits => "habits",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "notes" => Ok(Self::Notes),
            "habits" => Ok(Self::Habits),
            _ => Err(format!("unknown collection: {s}")),
        }
    }
}

/// A value that lives in exactly one collection, keyed by its `id`.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection this record type is stored in.
    const COLLECTION: Collection;

    /// Primary key within the collection.
    fn id(&self) -> &str;
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// UUID v7 primary key.
    pub id: String,
    pub title: String,
    pub content: String,
    /// Creation time in epoch milliseconds.
    pub created_at: i64,
    /// Network state at creation. Never updated afterwards.
    pub synced: bool,
}

impl Note {
    /// Create a note with a fresh id stamped with the current time.
    pub fn new(title: impl Into<String>, content: impl Into<String>, synced: bool) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            title: title.into(),
            content: content.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            synced,
        }
    }
}

impl Record for Note {
    const COLLECTION: Collection = Collection::Notes;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Order notes newest first by `created_at`. Storage order is unspecified.
pub fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// A tracked recurring activity.
///
/// `streak` is the total number of completed days, not a run of consecutive
/// days. It is kept in step with `completed_days` by [`Habit::toggle_day`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredHabit")]
pub struct Habit {
    pub id: String,
    pub name: String,
    completed_days: BTreeSet<NaiveDate>,
    streak: u32,
}

/// Habit payload as read from disk. The stored `streak` is ignored and
/// recomputed from `completedDays`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredHabit {
    id: String,
    name: String,
    #[serde(default)]
    completed_days: BTreeSet<NaiveDate>,
}

impl From<StoredHabit> for Habit {
    fn from(stored: StoredHabit) -> Self {
        let streak = stored.completed_days.len() as u32;
        Self {
            id: stored.id,
            name: stored.name,
            completed_days: stored.completed_days,
            streak,
        }
    }
}

impl Habit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            name: name.into(),
            completed_days: BTreeSet::new(),
            streak: 0,
        }
    }

    /// Flip completion for `day`. Returns `true` if the day is now complete.
    pub fn toggle_day(&mut self, day: NaiveDate) -> bool {
        let completed = if self.completed_days.remove(&day) {
            false
        } else {
            self.completed_days.insert(day);
            true
        };
        self.streak = self.completed_days.len() as u32;
        completed
    }

    pub fn is_completed_on(&self, day: NaiveDate) -> bool {
        self.completed_days.contains(&day)
    }

    /// Completed days in ascending order.
    pub fn completed_days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.completed_days.iter().copied()
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }
}

impl Record for Habit {
    const COLLECTION: Collection = Collection::Habits;

    fn id(&self) -> &str {
        &self.id
    }
}

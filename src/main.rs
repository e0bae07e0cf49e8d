mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dayjot::config::DayjotConfig;

#[derive(Parser)]
#[command(name = "dayjot", version, about = "Local-first journal and habit tracker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the offline cache proxy in front of the web app
    Serve,
    /// Manage journal notes
    Note {
        #[command(subcommand)]
        action: NoteAction,
    },
    /// Manage habits
    Habit {
        #[command(subcommand)]
        action: HabitAction,
    },
    /// Summarize the most recent notes with the remote model
    Insights,
    /// Run the deferred background sync hook
    Sync {
        #[arg(long, default_value = dayjot::cache::SYNC_NOTES_TAG)]
        tag: String,
    },
}

#[derive(Subcommand)]
enum NoteAction {
    /// Write a new note
    Add { title: String, content: String },
    /// List notes, newest first
    List,
    /// Delete a note by id
    Rm { id: String },
}

#[derive(Subcommand)]
enum HabitAction {
    /// Start tracking a habit
    Add { name: String },
    /// Mark a day complete, or unmark it if already complete
    Toggle {
        id: String,
        /// Day to toggle (YYYY-MM-DD), defaults to today
        #[arg(long)]
        day: Option<chrono::NaiveDate>,
    },
    /// List habits
    List,
    /// Stop tracking a habit
    Rm { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = DayjotConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => dayjot::server::serve(config).await?,
        Command::Note { action } => match action {
            NoteAction::Add { title, content } => cli::notes::add(&config, &title, &content).await?,
            NoteAction::List => cli::notes::list(&config).await?,
            NoteAction::Rm { id } => cli::notes::remove(&config, &id).await?,
        },
        Command::Habit { action } => match action {
            HabitAction::Add { name } => cli::habits::add(&config, &name).await?,
            HabitAction::Toggle { id, day } => cli::habits::toggle(&config, &id, day).await?,
            HabitAction::List => cli::habits::list(&config).await?,
            HabitAction::Rm { id } => cli::habits::remove(&config, &id).await?,
        },
        Command::Insights => cli::insights::insights(&config).await?,
        Command::Sync { tag } => cli::sync(&config, &tag).await?,
    }

    Ok(())
}

//! # edumesh
//!
//! Command-line client for EduMesh.
//!
//! ## Commands
//!
//! - `lesson add` / `lesson list` / `lesson publish`: Manage local lessons
//! - `progress`: Record progress on a lesson
//! - `quiz`: Record a quiz submission
//! - `status`: Show lessons, progress and the sync queue
//! - `sync`: Pull lessons from and push progress to a remote store
//! - `transfer-demo`: Send a file between two in-process peers
//!
//! ## Example
//!
//! ```bash
//! # Add a lesson from a local file
//! edumesh lesson add --title "Fractions" --topic Math --file fractions.pdf
//!
//! # Record progress while offline
//! edumesh progress <LESSON_ID> --percent 40
//! edumesh quiz <LESSON_ID> --score 85
//!
//! # Reconcile once online
//! edumesh sync --remote /mnt/school-share --actor instructor-1
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;
mod config;
mod remote;

use commands::{lesson, progress, quiz, status, sync, transfer};
use config::AppContext;

/// Command-line client for EduMesh.
#[derive(Parser, Debug)]
#[command(name = "edumesh")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the local database and edumesh.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage local lessons
    Lesson {
        #[command(subcommand)]
        action: LessonCommand,
    },

    /// Record progress on a lesson
    Progress {
        /// Lesson id
        lesson_id: String,

        /// Completion percentage (0-100)
        #[arg(long)]
        percent: Option<u8>,

        /// Mark the lesson completed
        #[arg(long)]
        completed: bool,
    },

    /// Record a quiz submission
    Quiz {
        /// Lesson id
        lesson_id: String,

        /// Score (0-100)
        #[arg(long)]
        score: u8,

        /// Seconds spent on the quiz
        #[arg(long, default_value = "0")]
        time_spent: u32,
    },

    /// Show lessons, progress and the sync queue
    Status,

    /// Pull lessons from and push progress to a remote store
    Sync {
        /// Directory acting as the remote store
        #[arg(long)]
        remote: PathBuf,

        /// Authenticated actor to push as
        #[arg(long)]
        actor: Option<String>,

        /// Only import remote lessons
        #[arg(long, conflicts_with = "push_only")]
        pull_only: bool,

        /// Only drain the local queue
        #[arg(long, conflicts_with = "pull_only")]
        push_only: bool,
    },

    /// Send a file between two in-process peers and keep it as a lesson
    TransferDemo {
        /// File to send
        #[arg(long)]
        file: PathBuf,

        /// Room name
        #[arg(long, default_value = "demo-room")]
        room: String,

        /// Title for the received lesson (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Topic for the received lesson
        #[arg(long, default_value = "Shared")]
        topic: String,
    },
}

#[derive(Subcommand, Debug)]
enum LessonCommand {
    /// Add a lesson from a local file
    Add {
        /// Lesson title
        #[arg(long)]
        title: String,

        /// Lesson topic
        #[arg(long)]
        topic: String,

        /// File holding the lesson content
        #[arg(long)]
        file: PathBuf,
    },

    /// List lessons, newest first
    List,

    /// Publish a local lesson to a remote store
    Publish {
        /// Lesson id
        lesson_id: String,

        /// Directory acting as the remote store
        #[arg(long)]
        remote: PathBuf,

        /// Authenticated actor to publish as
        #[arg(long)]
        actor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("edumesh=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "edumesh=info".into())
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let ctx = AppContext::open(&data_dir).await?;

    match cli.command {
        Commands::Lesson { action } => match action {
            LessonCommand::Add { title, topic, file } => {
                lesson::add(&ctx, &title, &topic, &file).await?;
            }
            LessonCommand::List => {
                lesson::list(&ctx).await?;
            }
            LessonCommand::Publish {
                lesson_id,
                remote,
                actor,
            } => {
                lesson::publish(&ctx, &lesson_id, &remote, actor.as_deref()).await?;
            }
        },
        Commands::Progress {
            lesson_id,
            percent,
            completed,
        } => {
            progress::run(&ctx, &lesson_id, percent, completed).await?;
        }
        Commands::Quiz {
            lesson_id,
            score,
            time_spent,
        } => {
            quiz::run(&ctx, &lesson_id, score, time_spent).await?;
        }
        Commands::Status => {
            status::run(&ctx).await?;
        }
        Commands::Sync {
            remote,
            actor,
            pull_only,
            push_only,
        } => {
            let mode = if pull_only {
                sync::Mode::PullOnly
            } else if push_only {
                sync::Mode::PushOnly
            } else {
                sync::Mode::Both
            };
            sync::run(&ctx, &remote, actor.as_deref(), mode).await?;
        }
        Commands::TransferDemo {
            file,
            room,
            title,
            topic,
        } => {
            transfer::run(&ctx, &file, &room, title.as_deref(), &topic).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for edumesh.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "edumesh", "edumesh")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

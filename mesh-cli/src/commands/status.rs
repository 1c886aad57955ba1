//! Show local state.

use anyhow::Result;
use mesh_store::LocalStore;

use super::format_timestamp;
use crate::config::AppContext;

/// Run the status command.
pub async fn run(ctx: &AppContext) -> Result<()> {
    println!("=== edumesh status ===");
    println!();
    println!("Data dir: {}", ctx.data_dir.display());
    println!();

    let lessons = ctx.store.list_lessons().await?;
    println!("Lessons: {}", lessons.len());
    println!();

    let progress = ctx.store.list_progress().await?;
    if progress.is_empty() {
        println!("Progress: none recorded");
    } else {
        println!("Progress:");
        for record in &progress {
            let quiz = match record.quiz_score {
                Some(score) => format!(", quiz {}", score),
                None => String::new(),
            };
            println!(
                "  {}  {}%{}{}  [{}]",
                record.lesson_id,
                record.percent,
                if record.completed { " completed" } else { "" },
                quiz,
                if record.synced { "synced" } else { "pending" }
            );
        }
    }
    println!();

    let queue = ctx.queue().pending().await?;
    println!("Sync queue: {} pending", queue.len());
    for item in &queue {
        let last = item
            .last_attempt_at
            .map(|t| format!(", last tried {}", format_timestamp(t)))
            .unwrap_or_default();
        println!(
            "  {} {}  attempts: {}{}",
            item.kind(),
            item.payload.record_key(),
            item.attempts,
            last
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_types::ProgressUpdate;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_on_empty_store() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::open(dir.path()).await.unwrap();
        assert!(run(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn status_with_queue() {
        let dir = tempdir().unwrap();
        let ctx = AppContext::open(dir.path()).await.unwrap();
        ctx.queue()
            .record_progress(&"L1".into(), ProgressUpdate::percent(25))
            .await
            .unwrap();
        assert!(run(&ctx).await.is_ok());
    }
}

//! Record lesson progress.

use anyhow::{bail, Result};
use mesh_types::{LessonId, ProgressUpdate};

use crate::config::AppContext;

/// Run the progress command.
pub async fn run(
    ctx: &AppContext,
    lesson_id: &str,
    percent: Option<u8>,
    completed: bool,
) -> Result<()> {
    if percent.is_none() && !completed {
        bail!("Nothing to record: pass --percent or --completed");
    }

    let update = ProgressUpdate {
        completed: completed.then_some(true),
        percent,
        quiz_score: None,
    };
    let record = ctx
        .queue()
        .record_progress(&LessonId::from(lesson_id), update)
        .await?;

    let state = if record.completed { "completed" } else { "in progress" };
    println!(
        "Lesson {}: {}% ({}), queued for sync",
        record.lesson_id, record.percent, state
    );
    Ok(())
}

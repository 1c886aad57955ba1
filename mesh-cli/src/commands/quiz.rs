//! Record a quiz submission.

use anyhow::Result;
use mesh_types::{now_millis, LessonId, QuizResult};
use std::collections::BTreeMap;

use crate::config::AppContext;

/// Run the quiz command.
pub async fn run(ctx: &AppContext, lesson_id: &str, score: u8, time_spent: u32) -> Result<()> {
    let result = QuizResult::new(
        LessonId::from(lesson_id),
        score,
        BTreeMap::new(),
        time_spent,
        now_millis(),
    );
    let passed = result.passed();
    let progress = ctx.queue().record_quiz_result(result).await?;

    println!(
        "Quiz for lesson {}: {} ({})",
        progress.lesson_id,
        score,
        if passed { "passed" } else { "not passed" }
    );
    if progress.completed {
        println!("Lesson marked completed.");
    }
    Ok(())
}

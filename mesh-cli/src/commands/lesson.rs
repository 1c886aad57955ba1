//! Add, list and publish lessons.

use anyhow::{Context, Result};
use mesh_client::SyncEngine;
use mesh_types::{ActorId, FileRef, LessonId};
use std::path::Path;

use super::format_timestamp;
use crate::config::AppContext;
use crate::remote::FileRemote;

/// Run `lesson add`.
pub async fn add(ctx: &AppContext, title: &str, topic: &str, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("File path has no file name")?;

    let lesson = ctx
        .library()
        .add_upload(name, mime_for(file), bytes, title, topic)
        .await?;

    println!("Added lesson {}", lesson.id);
    println!("  Title: {}", lesson.title);
    println!("  Topic: {}", lesson.topic);
    Ok(())
}

/// Run `lesson list`.
pub async fn list(ctx: &AppContext) -> Result<()> {
    let lessons = ctx.library().list_lessons().await?;
    if lessons.is_empty() {
        println!("No lessons yet.");
        println!();
        println!("Run 'edumesh lesson add' or 'edumesh sync' to get some.");
        return Ok(());
    }

    for lesson in lessons {
        let source = match &lesson.file_ref {
            Some(FileRef::Local(id)) => format!("local file {}", id),
            Some(FileRef::Remote(url)) => url.clone(),
            None => "no content".to_string(),
        };
        println!("{}  {} [{}]", lesson.id, lesson.title, lesson.topic);
        println!("    {} - added {}", source, format_timestamp(lesson.created_at));
    }
    Ok(())
}

/// Run `lesson publish`.
pub async fn publish(
    ctx: &AppContext,
    lesson_id: &str,
    remote_dir: &Path,
    actor: Option<&str>,
) -> Result<()> {
    let engine = SyncEngine::new(ctx.queue().clone(), FileRemote::new(remote_dir));
    let actor = actor.map(ActorId::from);

    let remote_id = engine
        .publish_lesson(actor.as_ref(), &LessonId::from(lesson_id))
        .await?;

    println!("Published lesson {} ({})", lesson_id, remote_id);
    Ok(())
}

/// Guess a MIME type from the file extension.
pub(crate) fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}

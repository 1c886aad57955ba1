//! Peer transfer demo over the in-process loopback channel.
//!
//! Plays both roles: the host offers a room, the joiner answers, the host
//! sends the file and the joiner keeps it as a lesson. The offer and answer
//! blobs are printed as they would be shown to the two users.

use anyhow::{bail, Context, Result};
use mesh_client::{LoopbackChannel, LoopbackNetwork, PeerSession, ReceivedFile, SessionEvent};
use mesh_types::{now_millis, FileId, FileRecord};
use std::path::Path;

use super::lesson::mime_for;
use crate::config::AppContext;

/// Run the transfer-demo command.
pub async fn run(
    ctx: &AppContext,
    file: &Path,
    room: &str,
    title: Option<&str>,
    topic: &str,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("File path has no file name")?;
    let record = FileRecord::new(
        FileId::random(),
        name,
        mime_for(file),
        bytes,
        now_millis(),
    );

    let network = LoopbackNetwork::new();
    let settings = ctx.config.transfer.clone();
    let host = PeerSession::new(LoopbackChannel::new(&network), settings.clone());
    let joiner = PeerSession::new(LoopbackChannel::new(&network), settings);

    let offer = host.create_room(room).await?;
    println!("Host offer for room {}:", room);
    println!("  {}", offer);

    let answer = joiner.join_room(room, &offer).await?;
    println!("Joiner answer:");
    println!("  {}", answer);

    host.complete_connection(&answer).await?;
    expect_connected(&host).await?;
    expect_connected(&joiner).await?;
    println!("Connected.");

    let (sent, received) = tokio::join!(host.send_file(&record), receive(&joiner));
    sent?;
    let received = received?;
    println!(
        "Received {} ({} bytes) from the host",
        received.name,
        received.bytes.len()
    );

    let title = title.unwrap_or(name).to_string();
    let lesson = ctx
        .library()
        .import_received(received, &title, topic)
        .await?;
    println!("Saved as lesson {}", lesson.id);

    host.disconnect().await;
    joiner.disconnect().await;
    Ok(())
}

async fn expect_connected<C: mesh_client::DataChannel>(session: &PeerSession<C>) -> Result<()> {
    match session.next_event().await {
        Some(SessionEvent::PeerConnected) => Ok(()),
        Some(SessionEvent::PeerDisconnected { reason }) => bail!("Connection failed: {}", reason),
        other => bail!("Unexpected session event: {:?}", other),
    }
}

async fn receive<C: mesh_client::DataChannel>(session: &PeerSession<C>) -> Result<ReceivedFile> {
    loop {
        match session.next_event().await {
            Some(SessionEvent::FileReceived(file)) => return Ok(file),
            Some(SessionEvent::TransferFailed { file_id, error }) => {
                bail!("Transfer {} failed: {}", file_id, error)
            }
            Some(SessionEvent::PeerDisconnected { reason }) => {
                bail!("Peer disconnected: {}", reason)
            }
            Some(SessionEvent::PeerConnected) => continue,
            None => bail!("Session closed before the file arrived"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_store::LocalStore;
    use tempfile::tempdir;

    #[tokio::test]
    async fn demo_imports_the_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("big.bin");
        let bytes: Vec<u8> = (0..50_000u32).map(|i| (i % 256) as u8).collect();
        std::fs::write(&file, &bytes).unwrap();

        let mut ctx = AppContext::open(dir.path()).await.unwrap();
        ctx.config.transfer.send_interval_ms = 0;

        run(&ctx, &file, "R1", Some("Big file"), "Demo").await.unwrap();

        let lessons = ctx.store.list_lessons().await.unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].title, "Big file");
        let stored = ctx.library().file_for(&lessons[0]).await.unwrap().unwrap();
        assert_eq!(stored.bytes, bytes);
    }

    #[tokio::test]
    async fn blank_room_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let ctx = AppContext::open(dir.path()).await.unwrap();
        assert!(run(&ctx, &file, " ", None, "Demo").await.is_err());
    }
}

//! Host and joiner sessions over the loopback channel, start to finish.

use std::sync::Arc;

use edumesh_client::{
    LessonLibrary, LoopbackChannel, LoopbackNetwork, PeerSession, SessionEvent, TransferConfig,
};
use mesh_core::PeerPhase;
use mesh_store::MemoryStore;
use mesh_types::{FileId, FileRecord, PeerMessage};

fn config() -> TransferConfig {
    TransferConfig::default()
        .with_chunk_size(16_384)
        .with_send_interval_ms(0)
}

#[tokio::test]
async fn room_r1_transfers_a_40k_file() {
    let network = LoopbackNetwork::new();
    let host = PeerSession::new(LoopbackChannel::new(&network), config());
    let joiner_channel = LoopbackChannel::new(&network);
    let joiner = PeerSession::new(joiner_channel.clone(), config());

    // Negotiate
    let offer = host.create_room("R1").await.unwrap();
    assert_eq!(host.phase().await, PeerPhase::Offering);

    let answer = joiner.join_room("R1", &offer).await.unwrap();
    host.complete_connection(&answer).await.unwrap();

    assert_eq!(host.next_event().await, Some(SessionEvent::PeerConnected));
    assert_eq!(joiner.next_event().await, Some(SessionEvent::PeerConnected));
    assert_eq!(host.phase().await, PeerPhase::Connected);
    assert_eq!(joiner.phase().await, PeerPhase::Connected);

    // Transfer
    let bytes: Vec<u8> = (0..40_000u32).map(|i| (i * 7 % 251) as u8).collect();
    let file = FileRecord::new(FileId::random(), "lesson.pdf", "application/pdf", bytes, 1);
    host.send_file(&file).await.unwrap();

    let received = match joiner.next_event().await {
        Some(SessionEvent::FileReceived(received)) => received,
        other => panic!("expected a file, got {:?}", other),
    };
    assert_eq!(received.bytes.len(), 40_000);
    assert_eq!(received.bytes, file.bytes);
    assert_eq!(received.name, "lesson.pdf");

    // What crossed the wire, as seen by the host's side of the channel.
    let frames: Vec<PeerMessage> = host
        .channel()
        .sent_frames()
        .iter()
        .map(|f| PeerMessage::from_json(f).unwrap())
        .collect();
    let chunk_sizes: Vec<usize> = frames
        .iter()
        .filter_map(|m| match m {
            PeerMessage::File(c) => Some(c.chunk.len()),
            _ => None,
        })
        .collect();
    let completes = frames
        .iter()
        .filter(|m| matches!(m, PeerMessage::FileComplete(_)))
        .count();
    assert_eq!(chunk_sizes, vec![16_384, 16_384, 7_232]);
    assert_eq!(completes, 1);

    // The joiner keeps the file as a lesson.
    let library = LessonLibrary::new(Arc::new(MemoryStore::new()));
    let lesson = library
        .import_received(received, "Shared lesson", "Science")
        .await
        .unwrap();
    let stored = library.file_for(&lesson).await.unwrap().unwrap();
    assert_eq!(stored.id, file.id);
    assert_eq!(stored.size_bytes, 40_000);

    // Tear down
    host.disconnect().await;
    assert!(matches!(
        joiner.next_event().await,
        Some(SessionEvent::PeerDisconnected { .. })
    ));
    assert_eq!(joiner.next_event().await, None);
    assert!(!joiner_channel.is_open());
}

#[tokio::test]
async fn sessions_transfer_in_both_directions() {
    let network = LoopbackNetwork::new();
    let host = PeerSession::new(LoopbackChannel::new(&network), config());
    let joiner = PeerSession::new(LoopbackChannel::new(&network), config());

    let offer = host.create_room("R2").await.unwrap();
    let answer = joiner.join_room("R2", &offer).await.unwrap();
    host.complete_connection(&answer).await.unwrap();
    assert_eq!(joiner.next_event().await, Some(SessionEvent::PeerConnected));
    assert_eq!(host.next_event().await, Some(SessionEvent::PeerConnected));

    let reply = FileRecord::new(FileId::random(), "answers.txt", "text/plain", b"42".to_vec(), 2);
    joiner.send_file(&reply).await.unwrap();

    match host.next_event().await {
        Some(SessionEvent::FileReceived(received)) => assert_eq!(received.bytes, b"42"),
        other => panic!("expected a file, got {:?}", other),
    }

    // Empty files still frame as start + complete.
    let empty = FileRecord::new(FileId::random(), "empty.txt", "text/plain", vec![], 3);
    host.send_file(&empty).await.unwrap();
    match joiner.next_event().await {
        Some(SessionEvent::FileReceived(received)) => assert!(received.bytes.is_empty()),
        other => panic!("expected a file, got {:?}", other),
    }
}

mod helpers;

use bytes::Bytes;
use coursecast_core::UploadCategory;
use coursecast_media::{StreamingUploader, UploadError, UploaderConfig};
use coursecast_storage::ObjectStore;
use helpers::store::MemoryObjectStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn small_part_config() -> UploaderConfig {
    UploaderConfig {
        part_size: 1024,
        max_concurrent_parts: 4,
        progress_byte_cadence: 4096,
    }
}

fn chunk_stream(
    chunks: Vec<Result<Bytes, std::io::Error>>,
) -> impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Unpin + Send {
    futures::stream::iter(chunks)
}

#[tokio::test]
async fn test_upload_stream_roundtrip() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let chunks: Vec<Result<Bytes, std::io::Error>> = payload
        .chunks(700)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let uploaded = uploader
        .upload_stream(
            Uuid::new_v4(),
            "lecture-01.mp4",
            UploadCategory::Video,
            Some(payload.len() as u64),
            chunk_stream(chunks),
        )
        .await
        .unwrap();

    assert_eq!(uploaded.total_bytes, payload.len() as u64);
    assert_eq!(uploaded.content_type, "video/mp4");
    assert!(uploaded.key.starts_with("videos/"));
    assert!(uploaded.key.ends_with(".mp4"));
    assert!(uploaded.etag.is_some());

    // Multi-part: 10_000 bytes at 1024-byte parts
    assert!(store.calls.parts() >= 9);
    assert_eq!(store.calls.completes(), 1);
    assert_eq!(store.calls.aborts(), 0);

    // Reassembled in part order
    assert_eq!(store.object(&uploaded.key).unwrap().as_ref(), &payload[..]);
}

#[tokio::test]
async fn test_disallowed_type_rejected_before_any_storage_call() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let result = uploader
        .begin_upload(
            Uuid::new_v4(),
            "malware.exe",
            UploadCategory::Video,
            Some(1024),
        )
        .await;

    assert!(matches!(result, Err(UploadError::Rejected(_))));
    assert_eq!(store.calls.begins(), 0);
    assert_eq!(store.calls.parts(), 0);
}

#[tokio::test]
async fn test_part_failure_aborts_exactly_once_and_key_never_readable() {
    // Part 3 fails: ~2 KiB of parts land before the error surfaces.
    let store = Arc::new(MemoryObjectStore::failing_at_part(3));
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let payload = vec![7u8; 8 * 1024];
    let chunks: Vec<Result<Bytes, std::io::Error>> = payload
        .chunks(1024)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let result = uploader
        .upload_stream(
            Uuid::new_v4(),
            "lecture-02.mp4",
            UploadCategory::Video,
            Some(payload.len() as u64),
            chunk_stream(chunks),
        )
        .await;

    let Err(UploadError::Failed {
        bytes_transferred, ..
    }) = result
    else {
        panic!("expected upload failure");
    };
    assert!(bytes_transferred > 0);

    assert_eq!(store.calls.aborts(), 1);
    assert_eq!(store.calls.completes(), 0);
    assert!(store.object_keys().is_empty());
}

#[tokio::test]
async fn test_stream_read_error_aborts() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from(vec![1u8; 2048])),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client disconnected",
        )),
    ];

    let result = uploader
        .upload_stream(
            Uuid::new_v4(),
            "lecture-03.mp4",
            UploadCategory::Video,
            None,
            chunk_stream(chunks),
        )
        .await;

    let Err(UploadError::Failed {
        bytes_transferred,
        message,
    }) = result
    else {
        panic!("expected upload failure");
    };
    assert_eq!(bytes_transferred, 2048);
    assert!(message.contains("client disconnected"));

    assert_eq!(store.calls.aborts(), 1);
    assert_eq!(store.calls.completes(), 0);
}

#[tokio::test]
async fn test_dropped_session_aborts_in_background() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let mut session = uploader
        .begin_upload(
            Uuid::new_v4(),
            "lecture-04.mp4",
            UploadCategory::Video,
            None,
        )
        .await
        .unwrap();
    session.write_chunk(&[0u8; 4096]).await.unwrap();

    // Simulates a cancelled request task.
    drop(session);

    let mut waited = Duration::ZERO;
    while store.calls.aborts() == 0 && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    assert_eq!(store.calls.aborts(), 1);
    assert_eq!(store.calls.completes(), 0);
}

#[tokio::test]
async fn test_progress_snapshot_tracks_bytes() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let mut session = uploader
        .begin_upload(
            Uuid::new_v4(),
            "lecture-05.mp4",
            UploadCategory::Video,
            Some(10_000),
        )
        .await
        .unwrap();

    session.write_chunk(&[0u8; 3000]).await.unwrap();
    let progress = session.progress();
    assert_eq!(progress.bytes_transferred, 3000);
    assert_eq!(progress.bytes_total, Some(10_000));

    session.write_chunk(&[0u8; 7000]).await.unwrap();
    assert_eq!(session.progress().bytes_transferred, 10_000);

    session.complete().await.unwrap();
}

#[tokio::test]
async fn test_empty_upload_completes() {
    let store = Arc::new(MemoryObjectStore::new());
    let uploader = StreamingUploader::new(store.clone(), small_part_config());

    let uploaded = uploader
        .upload_stream(
            Uuid::new_v4(),
            "lecture-06.mp4",
            UploadCategory::Video,
            Some(0),
            chunk_stream(vec![]),
        )
        .await
        .unwrap();

    assert_eq!(uploaded.total_bytes, 0);
    assert!(store.exists(&uploaded.key).await.unwrap());
}

//! End-to-end chunk intake and assembly tests.

mod common;

use common::mocks::{FlakyBackend, FlakyMetadata};
use common::{delivery, payload, state_with_backend, state_with_metadata, test_state};
use depot_core::ids::UploadId;
use depot_core::upload::UploadStatus;
use depot_engine::{ChunkReceiver, EngineError};
use depot_storage::{LocalBackend, StorageBackend};
use std::sync::Arc;

#[tokio::test]
async fn test_shuffled_delivery_assembles_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());

    // Chunks delivered [2, 0, 1].
    let (snap, handle) = receiver.receive(delivery("shuf", 200, 300, 3)).await.unwrap();
    assert!(handle.is_none());
    assert_eq!(snap.chunks_received, 1);
    assert_eq!(snap.status, UploadStatus::Processing);

    let (_, handle) = receiver.receive(delivery("shuf", 0, 100, 3)).await.unwrap();
    assert!(handle.is_none());

    let (snap, handle) = receiver.receive(delivery("shuf", 100, 200, 3)).await.unwrap();
    assert_eq!(snap.chunks_received, 3);
    let file = handle.expect("third chunk completes the set").wait().await.unwrap();

    assert_eq!(file.size_bytes, 300);
    let stored = state.storage.get(&file.name).await.unwrap();
    assert_eq!(stored, payload(0, 300));

    let id = UploadId::parse("shuf").unwrap();
    let row = state.metadata.get_upload("shuf").await.unwrap().unwrap();
    assert_eq!(row.status, "complete");
    assert_eq!(row.chunks_assembled, 3);
    assert!(state.transient.list_chunks(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_range_corrupts_then_retry_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let id = UploadId::parse("gap").unwrap();

    // Three chunks arrive but they leave [200, 250) uncovered.
    receiver.receive(delivery("gap", 0, 100, 3)).await.unwrap();
    receiver.receive(delivery("gap", 100, 200, 3)).await.unwrap();
    let (_, handle) = receiver.receive(delivery("gap", 250, 300, 3)).await.unwrap();

    let err = handle.unwrap().wait().await.unwrap_err();
    assert!(matches!(err, EngineError::AssemblyCorrupt(_)), "{err:?}");

    // Nothing stored, chunks retained, upload still retryable.
    assert_eq!(state.storage.total_size().await.unwrap(), 0);
    assert_eq!(state.transient.list_chunks(&id).await.unwrap().len(), 3);
    let row = state.metadata.get_upload("gap").await.unwrap().unwrap();
    assert_eq!(row.status, "processing");

    // The gap-filling chunk re-triggers assembly.
    let (_, handle) = receiver.receive(delivery("gap", 200, 250, 3)).await.unwrap();
    let file = handle.expect("gap fill re-triggers").wait().await.unwrap();
    assert_eq!(state.storage.get(&file.name).await.unwrap(), payload(0, 300));
}

#[tokio::test]
async fn test_duplicate_redelivery() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());

    let (snap, _) = receiver.receive(delivery("dup", 0, 100, 3)).await.unwrap();
    assert_eq!(snap.chunks_received, 1);

    // Byte-identical redelivery is acknowledged without double counting.
    let (snap, handle) = receiver.receive(delivery("dup", 0, 100, 3)).await.unwrap();
    assert_eq!(snap.chunks_received, 1);
    assert!(handle.is_none());

    // Same range with different content is a conflicting duplicate.
    let mut conflicting = delivery("dup", 0, 100, 3);
    conflicting.payload = bytes::Bytes::from(vec![0xFFu8; 100]);
    let err = receiver.receive(conflicting).await.unwrap_err();
    assert!(matches!(err, EngineError::ChunkRejected(_)), "{err:?}");
}

#[tokio::test]
async fn test_limit_and_shape_rejections() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());

    // Payload length disagreeing with the range.
    let mut bad = delivery("rej", 0, 100, 3);
    bad.payload = bytes::Bytes::from_static(b"short");
    assert!(matches!(
        receiver.receive(bad).await.unwrap_err(),
        EngineError::ChunkRejected(_)
    ));

    // Range past the declared size.
    assert!(matches!(
        receiver.receive(delivery("rej", 250, 350, 3)).await.unwrap_err(),
        EngineError::ChunkRejected(_)
    ));

    // Rejected deliveries must not create progress records.
    assert!(state.metadata.get_upload("rej").await.unwrap().is_none());

    // Total-chunk count disagreeing with the existing record.
    receiver.receive(delivery("rej2", 0, 100, 3)).await.unwrap();
    assert!(matches!(
        receiver.receive(delivery("rej2", 100, 200, 4)).await.unwrap_err(),
        EngineError::ChunkRejected(_)
    ));
}

#[tokio::test]
async fn test_chunk_after_completion_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());

    let (_, handle) = receiver.receive(delivery("done", 0, 300, 1)).await.unwrap();
    handle.unwrap().wait().await.unwrap();

    let err = receiver
        .receive(delivery("done", 0, 100, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ChunkRejected(_)), "{err:?}");
}

#[tokio::test]
async fn test_backend_write_failure_leaves_no_partial_object() {
    let dir = tempfile::tempdir().unwrap();
    let local = Arc::new(
        LocalBackend::new(dir.path().join("storage"))
            .await
            .unwrap(),
    );
    let flaky = Arc::new(FlakyBackend::new(local.clone()));
    let state = state_with_backend(dir.path(), flaky.clone()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let id = UploadId::parse("outage").unwrap();

    flaky.fail_writes(true);
    receiver.receive(delivery("outage", 0, 100, 3)).await.unwrap();
    receiver.receive(delivery("outage", 100, 200, 3)).await.unwrap();
    let (_, handle) = receiver.receive(delivery("outage", 200, 300, 3)).await.unwrap();

    let err = handle.unwrap().wait().await.unwrap_err();
    assert!(matches!(err, EngineError::BackendWrite(_)), "{err:?}");

    // No partial object, chunks retained, status still retryable.
    assert_eq!(local.total_size().await.unwrap(), 0);
    assert_eq!(state.transient.list_chunks(&id).await.unwrap().len(), 3);
    let row = state.metadata.get_upload("outage").await.unwrap().unwrap();
    assert_eq!(row.status, "processing");

    // Backend recovers; an explicit resume finishes the upload.
    flaky.fail_writes(false);
    let file = receiver.resume(&id).await.unwrap().wait().await.unwrap();
    assert_eq!(local.get(&file.name).await.unwrap(), payload(0, 300));
    assert!(state.transient.list_chunks(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_divergent_upload_facts_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let id = UploadId::parse("facts").unwrap();

    receiver.receive(delivery("facts", 0, 100, 3)).await.unwrap();
    receiver.receive(delivery("facts", 100, 200, 3)).await.unwrap();

    // The completing delivery disagrees with the recorded declared size.
    let mut divergent = delivery("facts", 200, 300, 3);
    divergent.declared_size = 400;
    let err = receiver.receive(divergent).await.unwrap_err();
    assert!(matches!(err, EngineError::ChunkRejected(_)), "{err:?}");

    // A delivery naming another owner is rejected too.
    let mut foreign = delivery("facts", 200, 300, 3);
    foreign.owner_id = "mallory".to_string();
    let err = receiver.receive(foreign).await.unwrap_err();
    assert!(matches!(err, EngineError::ChunkRejected(_)), "{err:?}");

    // The rejected deliveries counted nothing and the upload stays open.
    let row = state.metadata.get_upload("facts").await.unwrap().unwrap();
    assert_eq!(row.chunks_received, 2);
    assert_eq!(row.status, "processing");

    // A delivery matching the recorded facts completes the upload.
    let (_, handle) = receiver.receive(delivery("facts", 200, 300, 3)).await.unwrap();
    let file = handle.expect("matching delivery completes the set").wait().await.unwrap();
    assert_eq!(state.storage.get(&file.name).await.unwrap(), payload(0, 300));
    assert!(state.transient.list_chunks(&id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metadata_failure_during_assembly_aborts_sink() {
    let dir = tempfile::tempdir().unwrap();
    let inner = depot_metadata::from_config(&depot_core::config::MetadataConfig::Sqlite {
        path: dir.path().join("metadata.db"),
    })
    .await
    .unwrap();
    let flaky = Arc::new(FlakyMetadata::new(inner));
    let state = state_with_metadata(dir.path(), flaky.clone()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let id = UploadId::parse("dbout").unwrap();

    receiver.receive(delivery("dbout", 0, 100, 3)).await.unwrap();
    receiver.receive(delivery("dbout", 100, 200, 3)).await.unwrap();
    flaky.fail_chunk_assembled(true);
    let (_, handle) = receiver.receive(delivery("dbout", 200, 300, 3)).await.unwrap();

    let err = handle.unwrap().wait().await.unwrap_err();
    assert!(matches!(err, EngineError::Metadata(_)), "{err:?}");

    // The sink was aborted: no object and no leftover temp file on the
    // backend volume; chunks are retained for a retry.
    assert_eq!(state.storage.total_size().await.unwrap(), 0);
    let mut entries = tokio::fs::read_dir(dir.path().join("storage")).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
    assert_eq!(state.transient.list_chunks(&id).await.unwrap().len(), 3);
    let row = state.metadata.get_upload("dbout").await.unwrap().unwrap();
    assert_eq!(row.status, "processing");

    // Store recovers; an explicit resume finishes the upload.
    flaky.fail_chunk_assembled(false);
    let file = receiver.resume(&id).await.unwrap().wait().await.unwrap();
    assert_eq!(state.storage.get(&file.name).await.unwrap(), payload(0, 300));
}

#[tokio::test]
async fn test_double_finalization_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let finalizer = depot_engine::CatalogFinalizer::new(state.clone());

    let request = || depot_engine::FinalizeRequest {
        upload_id: Some(UploadId::parse("twice").unwrap()),
        name: "obj-1.bin".to_string(),
        size_bytes: 42,
        mime_type: "application/octet-stream".to_string(),
        owner_id: "alice".to_string(),
        options: Default::default(),
    };

    finalizer.finalize(request()).await.unwrap();
    let err = finalizer.finalize(request()).await.unwrap_err();
    assert!(matches!(err, EngineError::FinalizeConflict(_)), "{err:?}");

    let files = state.metadata.list_files_by_owner("alice").await.unwrap();
    assert_eq!(files.len(), 1);
}

//! Pending-upload management tests.

mod common;

use common::{delivery, test_state};
use depot_core::ids::UploadId;
use depot_engine::{ChunkReceiver, PendingUploads};

#[tokio::test]
async fn test_list_shows_only_non_terminal_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let pending = PendingUploads::new(state.clone());

    // One upload stays partial, one completes.
    receiver.receive(delivery("partial", 0, 100, 3)).await.unwrap();
    let (_, handle) = receiver.receive(delivery("finished", 0, 300, 1)).await.unwrap();
    handle.unwrap().wait().await.unwrap();

    let rows = pending.list("alice").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].upload_id, "partial");
    assert!(pending.list("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_removes_chunks_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let pending = PendingUploads::new(state.clone());

    receiver.receive(delivery("drop-me", 0, 100, 3)).await.unwrap();
    receiver.receive(delivery("drop-me", 100, 200, 3)).await.unwrap();
    receiver.receive(delivery("keep-me", 0, 100, 3)).await.unwrap();

    let drop_id = UploadId::parse("drop-me").unwrap();
    let keep_id = UploadId::parse("keep-me").unwrap();
    let unknown = UploadId::parse("never-was").unwrap();

    let removed = pending
        .delete("alice", &[drop_id.clone(), unknown.clone()])
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert!(state.transient.list_chunks(&drop_id).await.unwrap().is_empty());
    assert!(state.metadata.get_upload("drop-me").await.unwrap().is_none());
    // The other upload is untouched.
    assert_eq!(state.transient.list_chunks(&keep_id).await.unwrap().len(), 1);

    // Deleting again is a counted no-op.
    let removed = pending.delete("alice", &[drop_id]).await.unwrap();
    assert_eq!(removed, 0);
}

#[tokio::test]
async fn test_delete_skips_other_owners() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let receiver = ChunkReceiver::new(state.clone());
    let pending = PendingUploads::new(state.clone());

    receiver.receive(delivery("owned", 0, 100, 3)).await.unwrap();

    let id = UploadId::parse("owned").unwrap();
    let removed = pending.delete("mallory", &[id.clone()]).await.unwrap();
    assert_eq!(removed, 0);
    assert!(state.metadata.get_upload("owned").await.unwrap().is_some());
    assert_eq!(state.transient.list_chunks(&id).await.unwrap().len(), 1);
}

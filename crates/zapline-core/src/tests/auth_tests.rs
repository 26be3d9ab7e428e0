use crate::auth::{
    AuthState, CredentialStore, FileCredentialStore, InMemoryCredentialStore, CREDS_KEY,
};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn memory_store_round_trips_bytes_exactly() {
    let store = InMemoryCredentialStore::new();
    let blob: Vec<u8> = (0..=255).collect();
    store.write("creds", &blob).await.expect("write");
    assert_eq!(store.read("creds").await.expect("read"), Some(blob));
}

#[tokio::test]
async fn missing_key_is_none_not_error() {
    let store = InMemoryCredentialStore::new();
    assert_eq!(store.read("absent").await.expect("read"), None);
}

#[tokio::test]
async fn file_store_round_trips_and_clears() {
    let dir = tempdir().expect("tempdir");
    let store = FileCredentialStore::new(dir.path().join("auth"));
    let blob: Vec<u8> = (0..=255).collect();
    store
        .write("app-state-sync-key-AAA", &blob)
        .await
        .expect("write");
    assert_eq!(
        store.read("app-state-sync-key-AAA").await.expect("read"),
        Some(blob)
    );
    store.delete("app-state-sync-key-AAA").await.expect("delete");
    assert_eq!(
        store.read("app-state-sync-key-AAA").await.expect("read"),
        None
    );
    store.write(CREDS_KEY, b"blob").await.expect("write");
    store.clear_all().await.expect("clear");
    assert_eq!(store.read(CREDS_KEY).await.expect("read"), None);
}

#[tokio::test]
async fn file_store_sanitizes_awkward_keys() {
    let dir = tempdir().expect("tempdir");
    let store = FileCredentialStore::new(dir.path().join("auth"));
    store
        .write("sender-key/5511@s.whatsapp.net::1", b"material")
        .await
        .expect("write");
    assert_eq!(
        store
            .read("sender-key/5511@s.whatsapp.net::1")
            .await
            .expect("read"),
        Some(b"material".to_vec())
    );
}

#[tokio::test]
async fn delete_of_missing_key_is_ok() {
    let dir = tempdir().expect("tempdir");
    let store = FileCredentialStore::new(dir.path().join("auth"));
    store.delete("never-written").await.expect("delete");
    store.clear_all().await.expect("clear before any write");
}

#[tokio::test]
async fn read_many_reports_absent_keys() {
    let store = InMemoryCredentialStore::new();
    store.write("pre-key-1", b"a").await.expect("write");
    store.write("pre-key-3", b"c").await.expect("write");
    let keys = vec![
        "pre-key-1".to_string(),
        "pre-key-2".to_string(),
        "pre-key-3".to_string(),
    ];
    let values = store.read_many(&keys).await;
    assert_eq!(values.get("pre-key-1"), Some(&Some(b"a".to_vec())));
    assert_eq!(values.get("pre-key-2"), Some(&None));
    assert_eq!(values.get("pre-key-3"), Some(&Some(b"c".to_vec())));
}

#[tokio::test]
async fn auth_state_batches_keyed_material() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let auth = AuthState::new(store.clone());
    auth.set_keys(&[
        (
            "app-state-sync-key-1".to_string(),
            Some(b"first".to_vec()),
        ),
        (
            "app-state-sync-key-2".to_string(),
            Some(b"second".to_vec()),
        ),
    ])
    .await;
    // a None in the batch is a delete
    auth.set_keys(&[("app-state-sync-key-2".to_string(), None)])
        .await;
    let values = auth
        .keys(
            "app-state-sync-key",
            &["1".to_string(), "2".to_string()],
        )
        .await;
    assert_eq!(values.get("1"), Some(&Some(b"first".to_vec())));
    assert_eq!(values.get("2"), Some(&None));
}

#[tokio::test]
async fn auth_state_persists_main_credentials() {
    let store = Arc::new(InMemoryCredentialStore::new());
    let auth = AuthState::new(store.clone());
    assert_eq!(auth.creds().await, None);
    auth.save_creds(b"identity-blob").await;
    assert_eq!(auth.creds().await, Some(b"identity-blob".to_vec()));
    auth.clear().await;
    assert_eq!(auth.creds().await, None);
}

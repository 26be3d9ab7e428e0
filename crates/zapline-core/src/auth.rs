use crate::error::BridgeError;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key the main credential blob is stored under. Per-key signal material
/// uses `<category>-<id>` keys next to it.
pub const CREDS_KEY: &str = "creds";

/// Keyed persistence for opaque session-resumption blobs. Values must
/// round-trip byte-for-byte; a missing key is a valid state, not an error.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BridgeError>;
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), BridgeError>;
    async fn delete(&self, key: &str) -> Result<(), BridgeError>;
    /// Drop every stored credential. Taken on the logged-out closure path.
    async fn clear_all(&self) -> Result<(), BridgeError>;

    /// Batched read: all keys dispatched concurrently, joined on
    /// completion. A failed read surfaces as an absent key.
    async fn read_many(&self, keys: &[String]) -> HashMap<String, Option<Vec<u8>>> {
        let reads = keys.iter().map(|key| async move {
            let value = self.read(key).await.unwrap_or(None);
            (key.clone(), value)
        });
        join_all(reads).await.into_iter().collect()
    }
}

/// The credential surface handed to the network layer: the main blob plus
/// keyed batch get/set, all best-effort.
#[derive(Clone)]
pub struct AuthState {
    store: Arc<dyn CredentialStore>,
}

impl AuthState {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// `None` means no stored session: start a fresh pairing.
    pub async fn creds(&self) -> Option<Vec<u8>> {
        match self.store.read(CREDS_KEY).await {
            Ok(value) => value,
            Err(err) => {
                log::warn!("credential read failed: {}", err);
                None
            }
        }
    }

    pub async fn save_creds(&self, blob: &[u8]) {
        if let Err(err) = self.store.write(CREDS_KEY, blob).await {
            log::error!("failed to persist credentials: {}", err);
        }
    }

    /// Fetch key material for `ids` within a category, keyed back by id.
    pub async fn keys(&self, category: &str, ids: &[String]) -> HashMap<String, Option<Vec<u8>>> {
        let keys: Vec<String> = ids.iter().map(|id| format!("{}-{}", category, id)).collect();
        let values = self.store.read_many(&keys).await;
        ids.iter()
            .zip(keys.iter())
            .map(|(id, key)| (id.clone(), values.get(key).cloned().flatten()))
            .collect()
    }

    /// Apply a batch of writes (`Some`) and deletes (`None`) concurrently.
    /// Individual failures are logged and swallowed; the session keeps
    /// going and re-pairs later if material was lost.
    pub async fn set_keys(&self, batch: &[(String, Option<Vec<u8>>)]) {
        let tasks = batch.iter().map(|(key, value)| {
            let store = self.store.clone();
            async move {
                let result = match value {
                    Some(bytes) => store.write(key, bytes).await,
                    None => store.delete(key).await,
                };
                if let Err(err) = result {
                    log::warn!("credential update failed for {}: {}", key, err);
                }
            }
        });
        join_all(tasks).await;
    }

    pub async fn clear(&self) {
        if let Err(err) = self.store.clear_all().await {
            log::warn!("failed to clear credentials: {}", err);
        }
    }

    pub fn store(&self) -> Arc<dyn CredentialStore> {
        self.store.clone()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BridgeError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), BridgeError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BridgeError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), BridgeError> {
        self.entries.lock().await.clear();
        Ok(())
    }
}

/// Local fallback store: one file per key under a directory, removed
/// wholesale on logout.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(name)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, BridgeError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(_) => Err(BridgeError::Storage),
        }
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), BridgeError> {
        fs::create_dir_all(&self.dir).map_err(|_| BridgeError::Storage)?;
        fs::write(self.path_for(key), value).map_err(|_| BridgeError::Storage)
    }

    async fn delete(&self, key: &str) -> Result<(), BridgeError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) => Err(BridgeError::Storage),
        }
    }

    async fn clear_all(&self) -> Result<(), BridgeError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) => Err(BridgeError::Storage),
        }
    }
}

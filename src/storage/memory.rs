use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ObjectStore, StorageError};

const URL_PREFIX: &str = "memory://";

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Process-local object store, used by tests and throwaway setups.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}{}", URL_PREFIX, key))
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn key_for(&self, reference: &str) -> Option<String> {
        reference
            .strip_prefix(URL_PREFIX)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

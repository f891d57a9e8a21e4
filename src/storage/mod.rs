pub mod filesystem;
pub mod keys;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use keys::{sanitize_file_name, TemplateKeys};
pub use memory::InMemoryStore;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Binary object storage keyed by slash-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the public URL of the object.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// The key behind a URL previously returned by [`ObjectStore::upload`],
    /// or `None` when `reference` does not point into this store.
    fn key_for(&self, reference: &str) -> Option<String>;
}

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::{Component, Path, PathBuf};

use super::{ObjectStore, StorageError};

/// Characters escaped in a URL path segment. Non-ASCII is always escaped.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Filesystem-backed object store. Objects are served read-only by the HTTP
/// layer under `public_base_url`.
pub struct FilesystemStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FilesystemStore {
    pub async fn new(base_path: PathBuf, public_base_url: impl Into<String>) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|source| StorageError::Io {
                key: base_path.display().to_string(),
                source,
            })?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

fn io_error(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(key))?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(io_error(key))?;

        tracing::debug!("Stored {} ({} bytes, {})", key, bytes.len(), content_type);
        Ok(format!("{}/{}", self.public_base_url, encode_key(key)))
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(io_error(key)(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        tokio::fs::try_exists(&path).await.map_err(io_error(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    fn key_for(&self, reference: &str) -> Option<String> {
        let key = reference
            .strip_prefix(&self.public_base_url)?
            .strip_prefix('/')?
            .trim_start_matches('/');
        let key = percent_decode_str(key).decode_utf8().ok()?;
        (!key.is_empty()).then(|| key.into_owned())
    }
}

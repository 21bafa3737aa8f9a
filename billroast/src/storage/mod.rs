//! Storage backends for uploaded bills.
//!
//! Uploads are written once under a generated key and never modified afterwards. Two backends
//! implement [`FileStorage`]:
//!
//! - [`LocalFileStorage`]: durable, one file per upload in a directory created at startup
//! - [`MemoryFileStorage`]: ephemeral, for deployments without a writable filesystem
//!
//! The backend is chosen once from [`StorageConfig`] by [`create_file_storage`]; handlers only
//! ever see `Arc<dyn FileStorage>`.

pub mod errors;
pub mod models;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::StorageConfig;
pub use errors::{Result, StorageError};
pub use models::{StoreRequest, StoredFile};

/// Public path prefix uploads are served under
pub const UPLOADS_PATH: &str = "/uploads";

/// Extensions longer than this are dropped rather than preserved
const MAX_EXTENSION_LEN: usize = 16;

const MAX_KEY_LEN: usize = 255;

/// Trait for upload storage backends
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store content under a freshly generated key
    async fn store(&self, request: StoreRequest) -> Result<StoredFile>;

    /// Retrieve content by storage key
    async fn retrieve(&self, storage_key: &str) -> Result<Bytes>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Generate a storage key for an upload.
///
/// Keys are `<unix millis>-<uuid v4>[.<ext>]`. The timestamp keeps keys roughly sortable by upload
/// time; the UUID makes keys generated within the same millisecond distinct.
pub fn generate_storage_key(original_name: &str) -> String {
    let stamp = Utc::now().timestamp_millis();
    let unique = Uuid::new_v4().simple();
    match file_extension(original_name) {
        Some(ext) => format!("{stamp}-{unique}.{ext}"),
        None => format!("{stamp}-{unique}"),
    }
}

/// Extension of a client-supplied filename, if it is safe to reuse in a storage key.
fn file_extension(original_name: &str) -> Option<&str> {
    // Some browsers send the full client-side path
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or(original_name);
    let (stem, ext) = base.rsplit_once('.')?;

    // Dotfiles like ".env" have no extension
    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    ext.bytes().all(|b| b.is_ascii_alphanumeric()).then_some(ext)
}

/// Reject keys this service could never have generated before touching any backend.
pub fn validate_storage_key(storage_key: &str) -> Result<()> {
    let valid = !storage_key.is_empty()
        && storage_key.len() <= MAX_KEY_LEN
        && !storage_key.starts_with('.')
        && storage_key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(storage_key.to_string()))
    }
}

// ============================================================================
// Local Filesystem Storage Implementation
// ============================================================================

/// Durable storage backend - one file per upload in a single directory
pub struct LocalFileStorage {
    base_path: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, request: StoreRequest) -> Result<StoredFile> {
        let stored_name = generate_storage_key(&request.original_name);
        let full_path = self.base_path.join(&stored_name);

        // create_new: never clobber an existing upload, even on a key collision
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(stored_name.clone()),
                _ => StorageError::Io(e),
            })?;
        let written = async {
            file.write_all(&request.content).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            // Don't leave a truncated upload behind
            if let Err(cleanup) = fs::remove_file(&full_path).await {
                tracing::warn!(error = %cleanup, path = ?full_path, "Failed to remove partial upload");
            }
            return Err(e.into());
        }

        Ok(StoredFile {
            stored_name,
            original_name: request.original_name,
            size_bytes: request.content.len() as u64,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Bytes> {
        validate_storage_key(storage_key)?;
        let full_path = self.base_path.join(storage_key);

        match fs::read(&full_path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(storage_key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

// ============================================================================
// In-Memory Storage Implementation
// ============================================================================

/// Ephemeral storage backend - content lives as long as the process
#[derive(Default)]
pub struct MemoryFileStorage {
    files: DashMap<String, Bytes>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn store(&self, request: StoreRequest) -> Result<StoredFile> {
        let stored_name = generate_storage_key(&request.original_name);
        let size_bytes = request.content.len() as u64;

        match self.files.entry(stored_name.clone()) {
            Entry::Occupied(_) => return Err(StorageError::AlreadyExists(stored_name)),
            Entry::Vacant(slot) => {
                slot.insert(request.content);
            }
        }

        Ok(StoredFile {
            stored_name,
            original_name: request.original_name,
            size_bytes,
        })
    }

    async fn retrieve(&self, storage_key: &str) -> Result<Bytes> {
        validate_storage_key(storage_key)?;
        self.files
            .get(storage_key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create the storage backend selected by configuration
pub async fn create_file_storage(config: &StorageConfig) -> Result<Arc<dyn FileStorage>> {
    match config {
        StorageConfig::Local { path } => {
            tracing::info!("Creating local file storage backend (path: {:?})", path);
            fs::create_dir_all(path)
                .await
                .map_err(|e| StorageError::Other(anyhow::anyhow!("Failed to create upload directory {:?}: {}", path, e)))?;
            Ok(Arc::new(LocalFileStorage::new(path.clone())))
        }
        StorageConfig::Memory => {
            tracing::info!("Creating in-memory file storage backend (uploads do not survive restarts)");
            Ok(Arc::new(MemoryFileStorage::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn request(name: &str, content: &'static [u8]) -> StoreRequest {
        StoreRequest {
            original_name: name.to_string(),
            content: Bytes::from_static(content),
        }
    }

    #[test]
    fn test_extension_is_preserved() {
        assert_eq!(file_extension("receipt.png"), Some("png"));
        assert_eq!(file_extension("scan.final.JPEG"), Some("JPEG"));
        assert_eq!(file_extension("C:\\Users\\me\\bill.pdf"), Some("pdf"));
        assert_eq!(file_extension("photos/bill.heic"), Some("heic"));
    }

    #[test]
    fn test_unsafe_or_missing_extensions_are_dropped() {
        assert_eq!(file_extension("receipt"), None);
        assert_eq!(file_extension(".env"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension("bill.p?g"), None);
        assert_eq!(file_extension("bill.averyveryverylongextension"), None);
    }

    #[test]
    fn test_generated_key_shape() {
        let key = generate_storage_key("receipt.png");
        assert!(key.ends_with(".png"));
        assert!(validate_storage_key(&key).is_ok());

        let (stamp, rest) = key.split_once('-').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        assert_eq!(rest.len(), 32 + ".png".len());

        let bare = generate_storage_key("receipt");
        assert!(!bare.contains('.'));
    }

    #[test]
    fn test_validate_storage_key_rejects_traversal() {
        for key in ["", "..", "../etc/passwd", "a/b.png", "a\\b.png", ".hidden", "bill png"] {
            assert!(
                matches!(validate_storage_key(key), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_keys_are_distinct_across_concurrent_tasks() {
        let handles: Vec<_> = (0..32)
            .map(|_| tokio::spawn(async { (0..200).map(|_| generate_storage_key("r.png")).collect::<Vec<_>>() }))
            .collect();

        let mut keys = HashSet::new();
        for handle in handles {
            for key in handle.await.unwrap() {
                assert!(keys.insert(key), "duplicate storage key generated");
            }
        }
        assert_eq!(keys.len(), 32 * 200);
    }

    #[tokio::test]
    async fn test_local_storage_lifecycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path().to_path_buf());

        let stored = storage.store(request("receipt.png", b"not really a png")).await.unwrap();
        assert!(stored.stored_name.ends_with(".png"));
        assert_eq!(stored.original_name, "receipt.png");
        assert_eq!(stored.size_bytes, 16);
        assert_eq!(stored.public_path(), format!("/uploads/{}", stored.stored_name));
        assert!(temp_dir.path().join(&stored.stored_name).exists());

        let retrieved = storage.retrieve(&stored.stored_name).await.unwrap();
        assert_eq!(&retrieved[..], b"not really a png");
    }

    #[tokio::test]
    async fn test_local_storage_retrieve_nonexistent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(temp_dir.path().to_path_buf());

        let result = storage.retrieve("1700000000000-deadbeef.png").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_storage_rejects_keys_outside_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let uploads = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&uploads).unwrap();
        std::fs::write(temp_dir.path().join("secret.txt"), b"secret").unwrap();

        let storage = LocalFileStorage::new(uploads);
        let result = storage.retrieve("../secret.txt").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_memory_storage_lifecycle() {
        let storage = MemoryFileStorage::new();
        assert!(storage.is_empty());

        let first = storage.store(request("a.jpg", b"first")).await.unwrap();
        let second = storage.store(request("a.jpg", b"second")).await.unwrap();
        assert_ne!(first.stored_name, second.stored_name);
        assert_eq!(storage.len(), 2);

        assert_eq!(&storage.retrieve(&first.stored_name).await.unwrap()[..], b"first");
        assert_eq!(&storage.retrieve(&second.stored_name).await.unwrap()[..], b"second");

        let missing = storage.retrieve("1700000000000-missing.jpg").await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_factory_creates_upload_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("uploads");

        let storage = create_file_storage(&StorageConfig::Local { path: path.clone() }).await.unwrap();
        assert_eq!(storage.backend_name(), "local");
        assert!(path.is_dir());

        let memory = create_file_storage(&StorageConfig::Memory).await.unwrap();
        assert_eq!(memory.backend_name(), "memory");
    }
}

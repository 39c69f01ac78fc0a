use crate::content::{read_to_end_limited, Base64EncodedImage, StoredContent};
use crate::keys::{self, StorageKey};
use crate::location::{Location, LocationCodec, SegmentEncoding};
use crate::traits::{BoxedReader, Storage, StorageError, StorageResult};
use crate::StorageType;
use async_trait::async_trait;
use bytes::Bytes;
use docvault_core::DEFAULT_MAX_UPLOAD_BYTES;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Locations are absolute file paths below the storage root.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    codec: LocationCodec,
    max_upload_bytes: usize,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/docvault/content")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let prefix = format!(
            "{}/",
            base_path.to_string_lossy().trim_end_matches(['/', '\\'])
        );

        Ok(LocalStorage {
            base_path,
            codec: LocationCodec::with_prefix(prefix, SegmentEncoding::Raw),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        })
    }

    /// Limit on the number of bytes a single save may buffer.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn codec(&self) -> &LocationCodec {
        &self.codec
    }

    /// Convert storage key to filesystem path
    ///
    /// Key segments never contain separators or dot components, so the joined
    /// path always stays below the base directory.
    fn key_to_path(&self, key: &StorageKey) -> PathBuf {
        key.segments()
            .iter()
            .fold(self.base_path.clone(), |path, segment| path.join(segment))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_object(&self, key: &StorageKey, data: Bytes) -> StorageResult<Location> {
        let path = self.key_to_path(key);
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(self.codec.encode(key))
    }

    async fn read_object(&self, location: &Location) -> StorageResult<Bytes> {
        let key = self.codec.decode(location)?;
        let path = self.key_to_path(&key);
        let start = std::time::Instant::now();

        let data = fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            )),
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(Bytes::from(data))
    }

    async fn remove_object(&self, location: &Location) -> StorageResult<()> {
        let key = self.codec.decode(location)?;
        let path = self.key_to_path(&key);
        let start = std::time::Instant::now();

        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            )),
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn save_file(
        &self,
        reader: BoxedReader,
        entity_type: &str,
        entity_id: u64,
        file_name: &str,
    ) -> StorageResult<Location> {
        let key = keys::document_key(entity_type, entity_id, file_name)?;
        let data = read_to_end_limited(reader, self.max_upload_bytes).await?;
        self.write_object(&key, data).await
    }

    async fn delete_file(&self, location: &Location) -> StorageResult<()> {
        self.remove_object(location).await
    }

    async fn fetch_file(
        &self,
        location: &Location,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let data = self.read_object(location).await?;
        Ok(StoredContent::new(data, file_name, content_type))
    }

    async fn save_image(
        &self,
        reader: BoxedReader,
        resource_id: u64,
        image_name: &str,
    ) -> StorageResult<Location> {
        let key = keys::image_key(resource_id, image_name)?;
        let data = read_to_end_limited(reader, self.max_upload_bytes).await?;
        self.write_object(&key, data).await
    }

    async fn save_base64_image(
        &self,
        image: &Base64EncodedImage,
        resource_id: u64,
        image_name: &str,
    ) -> StorageResult<Location> {
        let key = keys::image_key(resource_id, &image.file_name(image_name))?;
        let data = image.decode_payload()?;
        if data.len() > self.max_upload_bytes {
            return Err(StorageError::PayloadTooLarge {
                size: data.len(),
                limit: self.max_upload_bytes,
            });
        }
        self.write_object(&key, data).await
    }

    async fn delete_image(&self, location: &Location) -> StorageResult<()> {
        self.remove_object(location).await
    }

    async fn fetch_image(
        &self,
        location: &Location,
        display_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let data = self.read_object(location).await?;
        Ok(StoredContent::new(data, display_name, content_type))
    }

    fn storage_type(&self) -> StorageType {
        StorageType::FileSystem
    }
}

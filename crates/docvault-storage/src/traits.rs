//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::content::{Base64EncodedImage, StoredContent};
use crate::location::Location;
use crate::StorageType;
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Input stream handed to the save operations.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Malformed location: {0}")]
    MalformedLocation(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A configured backend failed to start; `source` is the construction error.
    #[error("{storage_type} storage backend unavailable: {source}")]
    BackendUnavailable {
        storage_type: StorageType,
        #[source]
        source: Arc<StorageError>,
    },
}

impl StorageError {
    /// True when the backend reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// True for failures of the remote call itself (transport, auth, quota, 5xx).
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_)
                | StorageError::DownloadFailed(_)
                | StorageError::DeleteFailed(_)
                | StorageError::BackendError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// All storage backends (Azure, S3, local filesystem) implement this trait so the
/// document-management layer can store and retrieve content without knowing which
/// backend holds the bytes. The returned [`Location`] is the only handle callers
/// need to keep; it must be handed back to a backend of the same [`StorageType`].
///
/// Every operation either succeeds or fails with exactly one [`StorageError`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Buffer `reader` and store it as a document of the given parent entity.
    async fn save_file(
        &self,
        reader: BoxedReader,
        entity_type: &str,
        entity_id: u64,
        file_name: &str,
    ) -> StorageResult<Location>;

    /// Delete a document. A missing object is reported as `NotFound`.
    async fn delete_file(&self, location: &Location) -> StorageResult<()>;

    /// Download a document, paired with the caller's declared metadata.
    async fn fetch_file(
        &self,
        location: &Location,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent>;

    /// Buffer `reader` and store it as a client image.
    async fn save_image(
        &self,
        reader: BoxedReader,
        resource_id: u64,
        image_name: &str,
    ) -> StorageResult<Location>;

    /// Store a base64 encoded image; the stored name is `image_name` plus the
    /// image's file extension.
    async fn save_base64_image(
        &self,
        image: &Base64EncodedImage,
        resource_id: u64,
        image_name: &str,
    ) -> StorageResult<Location>;

    /// Delete an image. A missing object is reported as `NotFound`.
    async fn delete_image(&self, location: &Location) -> StorageResult<()>;

    /// Download an image, paired with the caller's declared metadata.
    async fn fetch_image(
        &self,
        location: &Location,
        display_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent>;

    /// Get the storage type tag
    fn storage_type(&self) -> StorageType;
}

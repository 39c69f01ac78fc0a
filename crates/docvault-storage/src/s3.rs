use crate::content::{read_to_end_limited, Base64EncodedImage, StoredContent};
use crate::keys::{self, StorageKey};
use crate::location::{Location, LocationCodec, SegmentEncoding};
use crate::traits::{BoxedReader, Storage, StorageError, StorageResult};
use crate::StorageType;
use async_trait::async_trait;
use bytes::Bytes;
use docvault_core::{S3Settings, DEFAULT_MAX_UPLOAD_BYTES};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::sync::Arc;

/// S3 storage implementation
///
/// The bucket must already exist: object stores expose no bucket creation, so
/// construction only validates the settings.
#[derive(Clone)]
pub struct S3Storage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    codec: LocationCodec,
    max_upload_bytes: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO, "https://nyc3.digitaloceanspaces.com" for DigitalOcean Spaces)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Build AmazonS3 object store from environment and explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let base_url = Self::public_base_url(&bucket, &region, endpoint_url.as_deref());
        Ok(Self::with_store(Arc::new(store), bucket, base_url))
    }

    pub async fn from_settings(settings: &S3Settings) -> StorageResult<Self> {
        Self::new(
            settings.bucket.clone(),
            settings.region.clone(),
            settings.endpoint.clone(),
        )
        .await
    }

    /// Wrap an existing object store; `base_url` is the public URL prefix of the bucket.
    pub fn with_store(store: Arc<dyn ObjectStore>, bucket: String, base_url: String) -> Self {
        let prefix = format!("{}/", base_url.trim_end_matches('/'));
        S3Storage {
            store,
            bucket,
            codec: LocationCodec::with_prefix(prefix, SegmentEncoding::Percent),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    /// Limit on the number of bytes a single save may buffer.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn codec(&self) -> &LocationCodec {
        &self.codec
    }

    /// Public URL prefix for objects in the bucket
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com
    /// For S3-compatible providers, uses path-style {endpoint}/{bucket}
    fn public_base_url(bucket: &str, region: &str, endpoint_url: Option<&str>) -> String {
        match endpoint_url {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
        }
    }

    fn object_path(key: &StorageKey) -> Path {
        Path::from(key.to_string())
    }

    async fn put_object(&self, key: &StorageKey, data: Bytes) -> StorageResult<Location> {
        let size = data.len() as u64;
        let location = Self::object_path(key);
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(self.codec.encode(key))
    }

    async fn get_object(&self, key: &StorageKey) -> StorageResult<Bytes> {
        let start = std::time::Instant::now();
        let location = Self::object_path(key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes)
    }

    /// S3 deletes are silent for missing keys, so existence is checked first.
    async fn delete_object(&self, key: &StorageKey) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Self::object_path(key);

        match self.store.head(&location).await {
            Ok(_) => {}
            Err(ObjectStoreError::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::BackendError(e.to_string())),
        }

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save_file(
        &self,
        reader: BoxedReader,
        entity_type: &str,
        entity_id: u64,
        file_name: &str,
    ) -> StorageResult<Location> {
        let key = keys::document_key(entity_type, entity_id, file_name)?;
        let data = read_to_end_limited(reader, self.max_upload_bytes).await?;
        self.put_object(&key, data).await
    }

    async fn delete_file(&self, location: &Location) -> StorageResult<()> {
        let key = self.codec.decode(location)?;
        self.delete_object(&key).await
    }

    async fn fetch_file(
        &self,
        location: &Location,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let key = self.codec.decode(location)?;
        let data = self.get_object(&key).await?;
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
        self.put_object(&key, data).await
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
        self.put_object(&key, data).await
    }

    async fn delete_image(&self, location: &Location) -> StorageResult<()> {
        let key = self.codec.decode(location)?;
        self.delete_object(&key).await
    }

    async fn fetch_image(
        &self,
        location: &Location,
        display_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let key = self.codec.decode(location)?;
        let data = self.get_object(&key).await?;
        Ok(StoredContent::new(data, display_name, content_type))
    }

    fn storage_type(&self) -> StorageType {
        StorageType::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use std::io::Cursor;

    fn in_memory_storage() -> S3Storage {
        S3Storage::with_store(
            Arc::new(InMemory::new()),
            "fineract".to_string(),
            "https://fineract.s3.eu-west-1.amazonaws.com".to_string(),
        )
    }

    #[test]
    fn test_public_base_url() {
        assert_eq!(
            S3Storage::public_base_url("docs", "eu-west-1", None),
            "https://docs.s3.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            S3Storage::public_base_url("docs", "us-east-1", Some("http://localhost:9000/")),
            "http://localhost:9000/docs"
        );
    }

    #[tokio::test]
    async fn test_s3_save_fetch_delete() {
        let storage = in_memory_storage();

        let location = storage
            .save_file(Box::pin(Cursor::new(b"statement".to_vec())), "savings", 9, "statement.pdf")
            .await
            .unwrap();
        assert!(location
            .as_str()
            .starts_with("https://fineract.s3.eu-west-1.amazonaws.com/documents/savings/9/"));

        let content = storage
            .fetch_file(&location, "statement.pdf", "application/pdf")
            .await
            .unwrap();
        assert_eq!(content.content.bytes().as_ref(), b"statement");

        storage.delete_file(&location).await.unwrap();

        let result = storage
            .fetch_file(&location, "statement.pdf", "application/pdf")
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));

        let result = storage.delete_file(&location).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_s3_rejects_azure_location() {
        let storage = in_memory_storage();
        let location = Location::from(
            "https://fineract.blob.core.windows.net/fineract-documents/documents/loans/1/abc/a.txt",
        );
        let result = storage.delete_file(&location).await;
        assert!(matches!(result, Err(StorageError::MalformedLocation(_))));
    }
}

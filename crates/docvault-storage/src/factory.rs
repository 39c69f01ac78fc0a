#[cfg(feature = "storage-azure")]
use crate::AzureBlobStorage;
#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageError, StorageResult, StorageType};
use docvault_core::StorageConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Create the storage backend selected by the configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    create_backend(config, config.storage_type).await
}

/// Create the backend for a specific storage type from the configuration
pub async fn create_backend(
    config: &StorageConfig,
    storage_type: StorageType,
) -> StorageResult<Arc<dyn Storage>> {
    match storage_type {
        #[cfg(feature = "storage-azure")]
        StorageType::Azure => {
            let settings = config.azure.as_ref().ok_or_else(|| {
                StorageError::ConfigError(
                    "AZURE_STORAGE_ACCOUNT_NAME and AZURE_STORAGE_ACCOUNT_KEY not configured"
                        .to_string(),
                )
            })?;

            let storage = AzureBlobStorage::new(settings)
                .await?
                .with_max_upload_bytes(config.max_upload_bytes);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-azure"))]
        StorageType::Azure => Err(StorageError::ConfigError(
            "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-s3")]
        StorageType::S3 => {
            let settings = config.s3.as_ref().ok_or_else(|| {
                StorageError::ConfigError(
                    "S3_BUCKET and S3_REGION or AWS_REGION not configured".to_string(),
                )
            })?;

            let storage = S3Storage::from_settings(settings)
                .await?
                .with_max_upload_bytes(config.max_upload_bytes);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageType::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageType::FileSystem => {
            let settings = config.local.as_ref().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(&settings.base_path)
                .await?
                .with_max_upload_bytes(config.max_upload_bytes);
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageType::FileSystem => Err(StorageError::ConfigError(
            "Filesystem storage backend not available (storage-local feature not enabled)"
                .to_string(),
        )),

        StorageType::Database => Err(StorageError::ConfigError(
            "Database storage backend not yet implemented".to_string(),
        )),
    }
}

/// Backends keyed by storage type
///
/// New content is saved through the default backend; fetches and deletes are
/// routed by the storage type persisted next to each location.
#[derive(Clone)]
pub struct StorageRegistry {
    default_type: StorageType,
    backends: HashMap<StorageType, Arc<dyn Storage>>,
    unavailable: HashMap<StorageType, Arc<StorageError>>,
}

impl StorageRegistry {
    /// Registry whose default backend is `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let default_type = storage.storage_type();
        let mut backends = HashMap::new();
        backends.insert(default_type, storage);
        StorageRegistry {
            default_type,
            backends,
            unavailable: HashMap::new(),
        }
    }

    /// Build the configured default backend plus every other backend the
    /// configuration has settings for.
    ///
    /// Secondary backends that fail to start are skipped with a warning; `get`
    /// for their storage type returns `BackendUnavailable` carrying the cause.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        let mut registry = Self::new(create_storage(config).await?);

        let mut secondary = Vec::new();
        if config.azure.is_some() {
            secondary.push(StorageType::Azure);
        }
        if config.s3.is_some() {
            secondary.push(StorageType::S3);
        }
        if config.local.is_some() {
            secondary.push(StorageType::FileSystem);
        }

        for storage_type in secondary {
            if registry.backends.contains_key(&storage_type) {
                continue;
            }
            match create_backend(config, storage_type).await {
                Ok(storage) => {
                    registry.register(storage);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        storage_type = %storage_type,
                        "Secondary storage backend unavailable"
                    );
                    registry.unavailable.insert(storage_type, Arc::new(e));
                }
            }
        }

        Ok(registry)
    }

    /// Add or replace the backend for its storage type.
    pub fn register(&mut self, storage: Arc<dyn Storage>) -> Option<Arc<dyn Storage>> {
        self.unavailable.remove(&storage.storage_type());
        self.backends.insert(storage.storage_type(), storage)
    }

    pub fn default_type(&self) -> StorageType {
        self.default_type
    }

    /// Backend used for new saves
    pub fn default_storage(&self) -> Arc<dyn Storage> {
        // The default backend is inserted on construction and never removed
        Arc::clone(&self.backends[&self.default_type])
    }

    /// Backend owning locations tagged with `storage_type`
    pub fn get(&self, storage_type: StorageType) -> StorageResult<Arc<dyn Storage>> {
        if let Some(storage) = self.backends.get(&storage_type) {
            return Ok(Arc::clone(storage));
        }

        match self.unavailable.get(&storage_type) {
            Some(cause) => Err(StorageError::BackendUnavailable {
                storage_type,
                source: Arc::clone(cause),
            }),
            None => Err(StorageError::ConfigError(format!(
                "No storage backend registered for storage type {}",
                storage_type
            ))),
        }
    }

    pub fn contains(&self, storage_type: StorageType) -> bool {
        self.backends.contains_key(&storage_type)
    }
}

/// Create a storage registry for testing (uses local storage)
#[cfg(all(test, feature = "storage-local"))]
pub async fn create_test_registry(dir: &std::path::Path) -> StorageResult<StorageRegistry> {
    let storage = LocalStorage::new(dir).await?;
    Ok(StorageRegistry::new(Arc::new(storage)))
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use docvault_core::LocalSettings;
    #[cfg(feature = "storage-azure")]
    use docvault_core::AzureSettings;

    fn local_config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            storage_type: StorageType::FileSystem,
            azure: None,
            s3: None,
            local: Some(LocalSettings {
                base_path: path.to_string_lossy().to_string(),
            }),
            max_upload_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_create_storage_local() {
        let dir = tempfile::tempdir().unwrap();
        let storage = create_storage(&local_config(dir.path())).await.unwrap();
        assert_eq!(storage.storage_type(), StorageType::FileSystem);
    }

    #[tokio::test]
    async fn test_database_backend_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.storage_type = StorageType::Database;
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_missing_settings_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.storage_type = StorageType::Azure;
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_registry_routes_by_storage_type() {
        let dir = tempfile::tempdir().unwrap();
        let registry = create_test_registry(dir.path()).await.unwrap();

        assert_eq!(registry.default_type(), StorageType::FileSystem);
        assert!(registry.contains(StorageType::FileSystem));
        assert_eq!(
            registry.get(StorageType::FileSystem).unwrap().storage_type(),
            StorageType::FileSystem
        );
        assert!(matches!(
            registry.get(StorageType::Azure),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StorageRegistry::from_config(&local_config(dir.path()))
            .await
            .unwrap();
        assert_eq!(
            registry.default_storage().storage_type(),
            StorageType::FileSystem
        );
        assert!(!registry.contains(StorageType::S3));
    }

    #[cfg(feature = "storage-azure")]
    #[tokio::test]
    async fn test_registry_reports_why_secondary_backend_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = local_config(dir.path());
        config.azure = Some(
            AzureSettings::new("fineract", "c2VjcmV0", "fineract-documents")
                .with_endpoint("http://127.0.0.1:1"),
        );

        let registry = StorageRegistry::from_config(&config).await.unwrap();
        assert_eq!(registry.default_type(), StorageType::FileSystem);
        assert!(!registry.contains(StorageType::Azure));

        match registry.get(StorageType::Azure) {
            Err(StorageError::BackendUnavailable {
                storage_type,
                source,
            }) => {
                assert_eq!(storage_type, StorageType::Azure);
                assert!(matches!(*source, StorageError::BackendError(_)));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("Azure backend should not be registered"),
        }
    }
}

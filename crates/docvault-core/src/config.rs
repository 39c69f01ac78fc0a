//! Configuration module
//!
//! Storage settings are read from the environment (a `.env` file is honoured)
//! and validated against the backend selected by `STORAGE_BACKEND`.

use std::env;
use std::fmt;

use crate::storage_types::StorageType;

/// Upload limit applied when `MAX_FILE_SIZE_MB` is not set (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_AZURE_ENDPOINT_SUFFIX: &str = "core.windows.net";
const DEFAULT_AZURE_CONTAINER: &str = "fineract-documents";

/// Azure Blob Storage settings
#[derive(Clone)]
pub struct AzureSettings {
    pub account_name: String,
    pub account_key: String,
    pub endpoint_suffix: String,
    /// Full service endpoint, overrides `https://{account}.blob.{suffix}` (Azurite, emulators)
    pub endpoint: Option<String>,
    pub container: String,
}

impl AzureSettings {
    pub fn new(
        account_name: impl Into<String>,
        account_key: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            account_name: account_name.into(),
            account_key: account_key.into(),
            endpoint_suffix: DEFAULT_AZURE_ENDPOINT_SUFFIX.to_string(),
            endpoint: None,
            container: container.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Resolved blob service endpoint, without a trailing slash.
    pub fn service_endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.blob.{}",
                self.account_name,
                self.endpoint_suffix.trim_matches('.')
            ),
        }
    }
}

impl fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureSettings")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("endpoint", &self.endpoint)
            .field("container", &self.container)
            .finish()
    }
}

/// S3 / S3-compatible settings
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
}

/// Local filesystem settings
#[derive(Clone, Debug)]
pub struct LocalSettings {
    pub base_path: String,
}

/// Storage configuration
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub azure: Option<AzureSettings>,
    pub s3: Option<S3Settings>,
    pub local: Option<LocalSettings>,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_type = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageType>()?,
            None => StorageType::FileSystem,
        };

        let azure = match (
            lookup("AZURE_STORAGE_ACCOUNT_NAME"),
            lookup("AZURE_STORAGE_ACCOUNT_KEY"),
        ) {
            (Some(account_name), Some(account_key)) => Some(AzureSettings {
                account_name,
                account_key,
                endpoint_suffix: lookup("AZURE_STORAGE_ENDPOINT_SUFFIX")
                    .unwrap_or_else(|| DEFAULT_AZURE_ENDPOINT_SUFFIX.to_string()),
                endpoint: lookup("AZURE_STORAGE_ENDPOINT"),
                container: lookup("AZURE_STORAGE_CONTAINER")
                    .unwrap_or_else(|| DEFAULT_AZURE_CONTAINER.to_string()),
            }),
            _ => None,
        };

        let s3 = match (
            lookup("S3_BUCKET"),
            lookup("S3_REGION").or_else(|| lookup("AWS_REGION")),
        ) {
            (Some(bucket), Some(region)) => Some(S3Settings {
                bucket,
                region,
                endpoint: lookup("S3_ENDPOINT"),
            }),
            _ => None,
        };

        let local = lookup("LOCAL_STORAGE_PATH").map(|base_path| LocalSettings { base_path });

        let max_upload_bytes = match lookup("MAX_FILE_SIZE_MB") {
            Some(value) => {
                let mb = value.trim().parse::<usize>().map_err(|e| {
                    anyhow::anyhow!(
                        "MAX_FILE_SIZE_MB must be a whole number, got {:?}: {}",
                        value,
                        e
                    )
                })?;
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| anyhow::anyhow!("MAX_FILE_SIZE_MB is too large: {}", mb))?
            }
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(StorageConfig {
            storage_type,
            azure,
            s3,
            local,
            max_upload_bytes,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than zero"));
        }

        match self.storage_type {
            StorageType::Azure => {
                let azure = self.azure.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "AZURE_STORAGE_ACCOUNT_NAME and AZURE_STORAGE_ACCOUNT_KEY must be set when using Azure storage backend"
                    )
                })?;
                if azure.container.is_empty() {
                    return Err(anyhow::anyhow!("AZURE_STORAGE_CONTAINER must not be empty"));
                }
            }
            StorageType::S3 => {
                if self.s3.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET and S3_REGION (or AWS_REGION) must be set when using S3 storage backend"
                    ));
                }
            }
            StorageType::FileSystem => {
                if self.local.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using filesystem storage backend"
                    ));
                }
            }
            StorageType::Database => {
                return Err(anyhow::anyhow!(
                    "Database storage backend is not available in this build"
                ));
            }
        }

        Ok(())
    }
}

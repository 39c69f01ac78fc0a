//! Azure Blob Storage backend.
//!
//! Talks to the Blob service REST API with Shared Key authorization. The backend is
//! bound to a single container which is created (or found to exist already) while the
//! backend is constructed; a value of [`AzureBlobStorage`] therefore always refers to a
//! usable container.
//!
//! Locations are blob URLs: `{endpoint}/{container}/{percent-encoded key}`. Decoding
//! strips that prefix, or for another host takes everything after the first
//! `{endpoint path}/{container}/`.

use crate::content::{read_to_end_limited, Base64EncodedImage, StoredContent};
use crate::keys::{self, StorageKey};
use crate::location::{Location, LocationCodec, SegmentEncoding};
use crate::traits::{BoxedReader, Storage, StorageError, StorageResult};
use crate::StorageType;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use docvault_core::{AzureSettings, DEFAULT_MAX_UPLOAD_BYTES};
use hmac::{Hmac, Mac};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blob service REST API version sent with every request.
const AZURE_API_VERSION: &str = "2023-11-03";
const BLOB_CONTENT_TYPE: &str = "application/octet-stream";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of the construction-time container bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    AlreadyExists,
}

/// Storage account name plus the decoded shared key.
struct SharedKeyCredential {
    account_name: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    fn new(account_name: &str, account_key: &str) -> StorageResult<Self> {
        let key = BASE64_STANDARD.decode(account_key.trim()).map_err(|e| {
            StorageError::ConfigError(format!("Azure account key is not valid base64: {}", e))
        })?;

        Ok(SharedKeyCredential {
            account_name: account_name.to_string(),
            key,
        })
    }

    /// `Authorization` header value for the given string-to-sign.
    fn authorization(&self, string_to_sign: &str) -> StorageResult<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| StorageError::ConfigError(format!("Invalid Azure account key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{}", self.account_name, signature))
    }
}

/// Build the Shared Key string-to-sign for a Blob service request.
///
/// Only the headers this backend sends are represented; the others are left empty.
fn string_to_sign(
    method: &Method,
    account_name: &str,
    url: &Url,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(&str, &str)],
) -> String {
    // Content-Length is signed as an empty string when zero
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), *value))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonicalized_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let mut canonicalized_resource = format!("/{}{}", account_name, url.path());
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.into_owned()))
        .collect();
    params.sort();
    for (name, value) in params {
        canonicalized_resource.push_str(&format!("\n{}:{}", name, value));
    }

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}{}",
        method.as_str(),
        content_length,
        content_type,
        canonicalized_headers,
        canonicalized_resource
    )
}

/// Container names: 3-63 characters, lowercase letters, digits and single hyphens.
fn validate_container_name(name: &str) -> StorageResult<()> {
    let valid = (3..=63).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--");

    if valid {
        Ok(())
    } else {
        Err(StorageError::ConfigError(format!(
            "Invalid Azure container name: {}",
            name
        )))
    }
}

fn error_code(response: &Response) -> String {
    response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn rfc1123_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Azure Blob Storage implementation
#[derive(Clone)]
pub struct AzureBlobStorage {
    client: reqwest::Client,
    credential: Arc<SharedKeyCredential>,
    endpoint: String,
    container: String,
    codec: LocationCodec,
    container_status: ContainerStatus,
    max_upload_bytes: usize,
}

impl AzureBlobStorage {
    /// Create a new AzureBlobStorage instance
    ///
    /// Creates the configured container. A container that already exists is accepted;
    /// any other failure aborts construction.
    pub async fn new(settings: &AzureSettings) -> StorageResult<Self> {
        validate_container_name(&settings.container)?;
        let credential = SharedKeyCredential::new(&settings.account_name, &settings.account_key)?;

        let endpoint = settings.service_endpoint();
        let endpoint_url = Url::parse(&endpoint).map_err(|e| {
            StorageError::ConfigError(format!("Invalid Azure endpoint {}: {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        // Path-style endpoints (emulators, proxies) keep their path in the marker
        let codec = LocationCodec::new(
            format!("{}/{}/", endpoint, settings.container),
            format!(
                "{}/{}/",
                endpoint_url.path().trim_end_matches('/'),
                settings.container
            ),
            SegmentEncoding::Percent,
        );

        let mut storage = AzureBlobStorage {
            client,
            credential: Arc::new(credential),
            endpoint,
            container: settings.container.clone(),
            codec,
            container_status: ContainerStatus::Created,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        };
        storage.container_status = storage.create_container().await?;

        Ok(storage)
    }

    /// Limit on the number of bytes a single save may buffer.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Whether construction created the container or found it in place.
    pub fn container_status(&self) -> ContainerStatus {
        self.container_status
    }

    pub fn codec(&self) -> &LocationCodec {
        &self.codec
    }

    fn parse_url(url: &str) -> StorageResult<Url> {
        Url::parse(url).map_err(|e| StorageError::MalformedLocation(format!("{}: {}", url, e)))
    }

    /// Build a signed request; `ms_headers` are extra `x-ms-*` headers.
    fn signed_request(
        &self,
        method: Method,
        url: Url,
        body: Bytes,
        content_type: &str,
        ms_headers: &[(&str, &str)],
    ) -> StorageResult<RequestBuilder> {
        let date = rfc1123_date();
        let mut all_ms_headers: Vec<(&str, &str)> = vec![
            ("x-ms-date", date.as_str()),
            ("x-ms-version", AZURE_API_VERSION),
        ];
        all_ms_headers.extend_from_slice(ms_headers);

        let authorization = self.credential.authorization(&string_to_sign(
            &method,
            &self.credential.account_name,
            &url,
            body.len(),
            content_type,
            &all_ms_headers,
        ))?;

        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", authorization);
        for (name, value) in &all_ms_headers {
            request = request.header(*name, *value);
        }
        if !content_type.is_empty() {
            request = request.header("Content-Type", content_type);
        }

        Ok(request.body(body))
    }

    /// Create Container; 409 `ContainerAlreadyExists` counts as success.
    async fn create_container(&self) -> StorageResult<ContainerStatus> {
        let url = Self::parse_url(&format!(
            "{}/{}?restype=container",
            self.endpoint, self.container
        ))?;

        let response = self
            .signed_request(Method::PUT, url, Bytes::new(), "", &[])?
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    "Azure container create request failed"
                );
                StorageError::BackendError(format!(
                    "Failed to create container {}: {}",
                    self.container, e
                ))
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(container = %self.container, "Azure container created");
            return Ok(ContainerStatus::Created);
        }

        let code = error_code(&response);
        if status == StatusCode::CONFLICT && code == CONTAINER_ALREADY_EXISTS {
            tracing::warn!(
                container = %self.container,
                "Azure container already exists, using it"
            );
            return Ok(ContainerStatus::AlreadyExists);
        }

        tracing::error!(
            container = %self.container,
            status = %status,
            error_code = %code,
            "Azure container create failed"
        );
        Err(StorageError::BackendError(format!(
            "Failed to create container {}: HTTP {} {}",
            self.container, status, code
        )))
    }

    /// Put Blob with the full buffer, returning the blob URL as location.
    async fn put_blob(&self, key: &StorageKey, data: Bytes) -> StorageResult<Location> {
        let location = self.codec.encode(key);
        let url = Self::parse_url(location.as_str())?;
        let size = data.len();
        let start = Instant::now();

        let response = self
            .signed_request(
                Method::PUT,
                url,
                data,
                BLOB_CONTENT_TYPE,
                &[("x-ms-blob-type", "BlockBlob")],
            )?
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Azure upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let code = error_code(&response);
            tracing::error!(
                container = %self.container,
                key = %key,
                status = %status,
                error_code = %code,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Azure upload rejected"
            );
            return Err(StorageError::UploadFailed(format!("HTTP {} {}", status, code)));
        }

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure upload successful"
        );

        Ok(location)
    }

    /// Get Blob into a buffer sized from the reported content length.
    async fn get_blob(&self, key: &StorageKey) -> StorageResult<Bytes> {
        let url = Self::parse_url(self.codec.encode(key).as_str())?;
        let start = Instant::now();

        let mut response = self
            .signed_request(Method::GET, url, Bytes::new(), "", &[])?
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Azure download failed"
                );
                StorageError::DownloadFailed(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let code = error_code(&response);
            tracing::error!(
                container = %self.container,
                key = %key,
                status = %status,
                error_code = %code,
                "Azure download rejected"
            );
            return Err(StorageError::DownloadFailed(format!("HTTP {} {}", status, code)));
        }

        let reported = response.content_length().unwrap_or(0) as usize;
        let mut buffer = BytesMut::with_capacity(reported);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
        {
            buffer.extend_from_slice(&chunk);
        }

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = buffer.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure download successful"
        );

        Ok(buffer.freeze())
    }

    async fn delete_blob(&self, key: &StorageKey) -> StorageResult<()> {
        let url = Self::parse_url(self.codec.encode(key).as_str())?;
        let start = Instant::now();

        let response = self
            .signed_request(Method::DELETE, url, Bytes::new(), "", &[])?
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Azure delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let code = error_code(&response);
            tracing::error!(
                container = %self.container,
                key = %key,
                status = %status,
                error_code = %code,
                "Azure delete rejected"
            );
            return Err(StorageError::DeleteFailed(format!("HTTP {} {}", status, code)));
        }

        tracing::info!(
            container = %self.container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Azure delete successful"
        );

        Ok(())
    }
}

#[async_trait]
impl Storage for AzureBlobStorage {
    async fn save_file(
        &self,
        reader: BoxedReader,
        entity_type: &str,
        entity_id: u64,
        file_name: &str,
    ) -> StorageResult<Location> {
        let key = keys::document_key(entity_type, entity_id, file_name)?;
        let data = read_to_end_limited(reader, self.max_upload_bytes).await?;
        self.put_blob(&key, data).await
    }

    async fn delete_file(&self, location: &Location) -> StorageResult<()> {
        let key = self.codec.decode(location)?;
        self.delete_blob(&key).await
    }

    async fn fetch_file(
        &self,
        location: &Location,
        file_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let key = self.codec.decode(location)?;
        let data = self.get_blob(&key).await?;
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
        self.put_blob(&key, data).await
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
        self.put_blob(&key, data).await
    }

    async fn delete_image(&self, location: &Location) -> StorageResult<()> {
        let key = self.codec.decode(location)?;
        self.delete_blob(&key).await
    }

    async fn fetch_image(
        &self,
        location: &Location,
        display_name: &str,
        content_type: &str,
    ) -> StorageResult<StoredContent> {
        let key = self.codec.decode(location)?;
        let data = self.get_blob(&key).await?;
        Ok(StoredContent::new(data, display_name, content_type))
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Azure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_sign_for_blob_upload() {
        let url = Url::parse("https://fineract.blob.core.windows.net/docs/documents/a.txt").unwrap();
        let signed = string_to_sign(
            &Method::PUT,
            "fineract",
            &url,
            3,
            BLOB_CONTENT_TYPE,
            &[
                ("x-ms-version", AZURE_API_VERSION),
                ("x-ms-date", "Mon, 19 Oct 2026 10:00:00 GMT"),
                ("x-ms-blob-type", "BlockBlob"),
            ],
        );

        let expected = "PUT\n\n\n3\n\napplication/octet-stream\n\n\n\n\n\n\n\
            x-ms-blob-type:BlockBlob\n\
            x-ms-date:Mon, 19 Oct 2026 10:00:00 GMT\n\
            x-ms-version:2023-11-03\n\
            /fineract/docs/documents/a.txt";
        assert_eq!(signed, expected);
    }

    #[test]
    fn test_string_to_sign_includes_query_parameters() {
        let url = Url::parse("http://127.0.0.1:10000/devstoreaccount1/docs?restype=container").unwrap();
        let signed = string_to_sign(&Method::PUT, "devstoreaccount1", &url, 0, "", &[]);
        assert!(signed.starts_with("PUT\n\n\n\n\n\n"));
        assert!(signed.ends_with("/devstoreaccount1/devstoreaccount1/docs\nrestype:container"));
    }

    #[test]
    fn test_authorization_header_format() {
        let credential = SharedKeyCredential::new("fineract", "c2VjcmV0LWtleQ==").unwrap();
        let header = credential.authorization("GET\n").unwrap();
        assert!(header.starts_with("SharedKey fineract:"));

        let again = credential.authorization("GET\n").unwrap();
        assert_eq!(header, again);
        assert_ne!(header, credential.authorization("PUT\n").unwrap());
    }

    #[test]
    fn test_invalid_account_key_rejected() {
        let result = SharedKeyCredential::new("fineract", "not base64!");
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[test]
    fn test_container_name_rules() {
        assert!(validate_container_name("fineract-documents").is_ok());
        assert!(validate_container_name("ab").is_err());
        assert!(validate_container_name("Documents").is_err());
        assert!(validate_container_name("-docs").is_err());
        assert!(validate_container_name("docs--archive").is_err());
    }

    #[tokio::test]
    async fn test_construction_fails_on_unreachable_endpoint() {
        let settings = AzureSettings::new("fineract", "c2VjcmV0", "fineract-documents")
            .with_endpoint("http://127.0.0.1:1");
        let result = AzureBlobStorage::new(&settings).await;
        assert!(matches!(result, Err(StorageError::BackendError(_))));
    }
}

//! Content types passed into and out of storage backends.

use crate::traits::{BoxedReader, StorageError, StorageResult};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::io::Cursor;
use tokio::io::AsyncReadExt;

/// Restartable byte source over an immutable in-memory buffer.
///
/// Every call to [`ByteSource::open`] returns an independent cursor, so fetched
/// content can be read several times (checksum first, then stream it onward)
/// without downloading it again. Cloning is cheap; the buffer is shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSource {
    data: Bytes,
}

impl ByteSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        ByteSource { data: data.into() }
    }

    /// Open a fresh reader positioned at the start of the buffer.
    ///
    /// The cursor implements both `std::io::Read` and `tokio::io::AsyncRead`.
    pub fn open(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

/// Fetched content paired with the caller's declared metadata.
///
/// Backends do not track content types; name and type come from the caller's
/// metadata record and are passed through unchanged.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub content: ByteSource,
    pub file_name: String,
    pub content_type: String,
}

impl StoredContent {
    pub fn new(data: impl Into<Bytes>, file_name: &str, content_type: &str) -> Self {
        StoredContent {
            content: ByteSource::new(data),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
        }
    }
}

/// Read the whole stream into memory, failing once more than `limit` bytes arrive.
pub async fn read_to_end_limited(reader: BoxedReader, limit: usize) -> StorageResult<Bytes> {
    let mut buffer = Vec::new();
    let cap = (limit as u64).saturating_add(1);
    reader.take(cap).read_to_end(&mut buffer).await?;

    if buffer.len() > limit {
        return Err(StorageError::PayloadTooLarge {
            size: buffer.len(),
            limit,
        });
    }

    Ok(Bytes::from(buffer))
}

/// Image file extensions accepted for data URL uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileExtension {
    Jpeg,
    Png,
    Gif,
}

impl ImageFileExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFileExtension::Jpeg => ".jpeg",
            ImageFileExtension::Png => ".png",
            ImageFileExtension::Gif => ".gif",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFileExtension::Jpeg),
            "image/png" => Some(ImageFileExtension::Png),
            "image/gif" => Some(ImageFileExtension::Gif),
            _ => None,
        }
    }
}

/// A base64 encoded image, usually a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64EncodedImage {
    pub base64_encoded_string: String,
    pub file_extension: String,
}

impl Base64EncodedImage {
    pub fn new(base64_encoded_string: impl Into<String>, file_extension: impl Into<String>) -> Self {
        Base64EncodedImage {
            base64_encoded_string: base64_encoded_string.into(),
            file_extension: file_extension.into(),
        }
    }

    /// Build from a data URL, picking the file extension from its MIME type.
    pub fn from_data_url(data_url: &str) -> StorageResult<Self> {
        let mime = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(mime, _)| mime)
            .ok_or_else(|| {
                StorageError::InvalidPayload("expected a data:<mime>;base64, URL".to_string())
            })?;

        let extension = ImageFileExtension::from_mime(mime).ok_or_else(|| {
            StorageError::InvalidPayload(format!("unsupported image type: {}", mime))
        })?;

        Ok(Base64EncodedImage::new(data_url, extension.as_str()))
    }

    /// Decode the payload following the first comma.
    ///
    /// Input without a comma is rejected rather than decoded as a whole.
    pub fn decode_payload(&self) -> StorageResult<Bytes> {
        let (_, payload) = self
            .base64_encoded_string
            .split_once(',')
            .ok_or_else(|| {
                StorageError::InvalidPayload("base64 image has no ',' before its payload".to_string())
            })?;

        let decoded = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| StorageError::InvalidPayload(format!("invalid base64 image data: {}", e)))?;

        Ok(Bytes::from(decoded))
    }

    /// Stored name for this image: `image_name` followed by the file extension.
    pub fn file_name(&self, image_name: &str) -> String {
        format!("{}{}", image_name, self.file_extension)
    }
}

//! Docvault Storage Library
//!
//! This crate provides the storage abstraction used to persist uploaded documents
//! and client images. It includes the `Storage` trait and implementations for
//! Azure Blob Storage, S3 and the local filesystem.
//!
//! # Storage key format
//!
//! All backends use the same key layout so that content is addressed consistently:
//!
//! - **Documents**: `documents/{entity_type}/{entity_id}/{random}/{file_name}`
//! - **Images**: `images/clients/{resource_id}/{random}/{image_name}`
//!
//! The random segment is 16 alphanumeric characters generated per save, so two
//! uploads of the same file name under the same entity never overwrite each other.
//! Key generation is centralized in the `keys` module.
//!
//! # Locations
//!
//! Every save returns a [`Location`]: an opaque string (a blob URL, an object URL
//! or a file path depending on the backend) that callers persist together with the
//! backend's [`StorageType`]. Handing the location back to the same backend
//! recovers the original key through that backend's [`LocationCodec`].

#[cfg(feature = "storage-azure")]
pub mod azure;
pub mod content;
pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod location;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
#[cfg(feature = "storage-azure")]
pub use azure::AzureBlobStorage;
pub use content::{Base64EncodedImage, ByteSource, StoredContent};
pub use docvault_core::StorageType;
pub use factory::{create_storage, StorageRegistry};
pub use keys::StorageKey;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use location::{Location, LocationCodec, SegmentEncoding};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{BoxedReader, Storage, StorageError, StorageResult};

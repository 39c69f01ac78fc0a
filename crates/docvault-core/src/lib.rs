//! Docvault Core Library
//!
//! This crate provides the domain types shared by every docvault component:
//! the storage type tag persisted next to document metadata and the storage
//! configuration loaded from the environment.

pub mod config;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    AzureSettings, LocalSettings, S3Settings, StorageConfig, DEFAULT_MAX_UPLOAD_BYTES,
};
pub use storage_types::StorageType;

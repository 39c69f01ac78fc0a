use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage type tag
///
/// Identifies which backend produced (and therefore owns) a stored location.
/// It is persisted next to the document or image metadata so that later
/// fetch and delete calls can be routed to the same backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "storage_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    FileSystem,
    S3,
    Azure,
    Database,
}

impl StorageType {
    /// All known storage types, in code order.
    pub const ALL: [StorageType; 4] = [
        StorageType::FileSystem,
        StorageType::S3,
        StorageType::Azure,
        StorageType::Database,
    ];

    /// Stable integer code used when the tag is stored as a number.
    pub fn code(self) -> i32 {
        match self {
            StorageType::FileSystem => 1,
            StorageType::S3 => 2,
            StorageType::Azure => 3,
            StorageType::Database => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }
}

impl FromStr for StorageType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filesystem" | "file_system" | "local" | "fs" => Ok(StorageType::FileSystem),
            "s3" => Ok(StorageType::S3),
            "azure" => Ok(StorageType::Azure),
            "database" => Ok(StorageType::Database),
            _ => Err(anyhow::anyhow!("Invalid storage type: {}", s)),
        }
    }
}

impl Display for StorageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageType::FileSystem => write!(f, "filesystem"),
            StorageType::S3 => write!(f, "s3"),
            StorageType::Azure => write!(f, "azure"),
            StorageType::Database => write!(f, "database"),
        }
    }
}

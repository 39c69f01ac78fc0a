//! Shared key generation for storage backends.
//!
//! Key format: `documents/{entity_type}/{entity_id}/{random}/{file_name}` for documents and
//! `images/clients/{resource_id}/{random}/{image_name}` for client images.

use crate::traits::{StorageError, StorageResult};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Separator used between key segments on every backend.
pub const SEPARATOR: char = '/';

/// Length of the random disambiguator segment.
pub const RANDOM_SEGMENT_LEN: usize = 16;

const DOCUMENTS_ROOT: &str = "documents";
const IMAGES_ROOT: &str = "images";
const CLIENT_IMAGES: &str = "clients";

/// A backend-independent storage key: an ordered list of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    segments: Vec<String>,
}

impl StorageKey {
    /// Build a key from segments, validating each one.
    pub fn from_segments<I, S>(segments: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(StorageError::InvalidKey("storage key is empty".to_string()));
        }
        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(StorageKey { segments })
    }

    /// Parse a `/` separated key.
    pub fn parse(key: &str) -> StorageResult<Self> {
        Self::from_segments(key.split(SEPARATOR))
    }

    /// Append a final segment, typically the file or image name.
    pub fn join(&self, name: &str) -> StorageResult<Self> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(StorageKey { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment of the key (the stored file name for complete keys).
    pub fn file_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Reject segments that would change the shape of the key once joined.
fn validate_segment(segment: &str) -> StorageResult<()> {
    if segment.is_empty() {
        return Err(StorageError::InvalidKey(
            "key segment must not be empty".to_string(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(StorageError::InvalidKey(format!(
            "key segment must not be a relative path component: {}",
            segment
        )));
    }
    if segment.contains(SEPARATOR) || segment.contains('\\') || segment.chars().any(char::is_control) {
        return Err(StorageError::InvalidKey(format!(
            "key segment contains a path separator or control character: {:?}",
            segment
        )));
    }
    Ok(())
}

/// Random alphanumeric disambiguator, fresh for every save.
pub fn generate_random_segment() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SEGMENT_LEN)
        .map(char::from)
        .collect()
}

/// Parent directory for a document: `documents/{entity_type}/{entity_id}/{random}`.
pub fn document_directory(entity_type: &str, entity_id: u64) -> StorageResult<StorageKey> {
    StorageKey::from_segments([
        DOCUMENTS_ROOT.to_string(),
        entity_type.to_string(),
        entity_id.to_string(),
        generate_random_segment(),
    ])
}

/// Parent directory for a client image: `images/clients/{resource_id}/{random}`.
pub fn image_directory(resource_id: u64) -> StorageKey {
    StorageKey {
        segments: vec![
            IMAGES_ROOT.to_string(),
            CLIENT_IMAGES.to_string(),
            resource_id.to_string(),
            generate_random_segment(),
        ],
    }
}

/// Full key for a document upload.
pub fn document_key(entity_type: &str, entity_id: u64, file_name: &str) -> StorageResult<StorageKey> {
    document_directory(entity_type, entity_id)?.join(file_name)
}

/// Full key for a client image upload.
pub fn image_key(resource_id: u64, image_name: &str) -> StorageResult<StorageKey> {
    image_directory(resource_id).join(image_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_layout() {
        let key = document_key("loans", 42, "note.txt").unwrap();
        let segments = key.segments();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], "documents");
        assert_eq!(segments[1], "loans");
        assert_eq!(segments[2], "42");
        assert_eq!(segments[3].len(), RANDOM_SEGMENT_LEN);
        assert!(segments[3].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(key.file_name(), "note.txt");
        assert!(key.to_string().starts_with("documents/loans/42/"));
    }

    #[test]
    fn test_image_key_layout() {
        let key = image_key(7, "portrait.png").unwrap();
        let segments = key.segments();
        assert_eq!(&segments[..3], &["images", "clients", "7"]);
        assert_eq!(segments[3].len(), RANDOM_SEGMENT_LEN);
        assert_eq!(segments[4], "portrait.png");
    }

    #[test]
    fn test_random_segment_differs_between_calls() {
        let first = document_directory("clients", 1).unwrap();
        let second = document_directory("clients", 1).unwrap();
        assert_ne!(first.segments()[3], second.segments()[3]);
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_entity_type_rejected() {
        let result = document_directory("", 1);
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_separator_in_names_rejected() {
        assert!(matches!(
            document_directory("loans/../../etc", 1),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            document_key("loans", 1, "a/b.txt"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            image_key(1, "..\\win.ini"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(image_key(1, ".."), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_parse_display_round_trip() {
        let key = StorageKey::parse("documents/loans/42/abc/report final.pdf").unwrap();
        assert_eq!(key.segments().len(), 5);
        assert_eq!(key.to_string(), "documents/loans/42/abc/report final.pdf");

        assert!(StorageKey::parse("documents//x").is_err());
        assert!(StorageKey::parse("").is_err());
    }
}

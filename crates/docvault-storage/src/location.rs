//! Location encoding and decoding.
//!
//! A [`Location`] is what a backend hands back on save and what the caller persists.
//! Each backend owns a [`LocationCodec`] describing how a key is turned into a location
//! (`prefix` + encoded key) and how it is recovered again (everything after `prefix`,
//! or after the first occurrence of `marker` when the location was written under
//! another prefix).

use crate::keys::{StorageKey, SEPARATOR};
use crate::traits::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque handle to stored content, returned on save and supplied on fetch/delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(location: impl Into<String>) -> Self {
        Location(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<String> for Location {
    fn from(location: String) -> Self {
        Location(location)
    }
}

impl From<&str> for Location {
    fn from(location: &str) -> Self {
        Location(location.to_string())
    }
}

/// How key segments are written into a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEncoding {
    /// Percent-encode each segment (URL locations).
    Percent,
    /// Write segments verbatim (filesystem paths).
    Raw,
}

#[derive(Debug, Clone)]
pub struct LocationCodec {
    prefix: String,
    marker: String,
    encoding: SegmentEncoding,
}

impl LocationCodec {
    pub fn new(
        prefix: impl Into<String>,
        marker: impl Into<String>,
        encoding: SegmentEncoding,
    ) -> Self {
        LocationCodec {
            prefix: prefix.into(),
            marker: marker.into(),
            encoding,
        }
    }

    /// Codec whose decode marker is the full encode prefix.
    pub fn with_prefix(prefix: impl Into<String>, encoding: SegmentEncoding) -> Self {
        let prefix = prefix.into();
        LocationCodec {
            marker: prefix.clone(),
            prefix,
            encoding,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn encode(&self, key: &StorageKey) -> Location {
        let mut location = self.prefix.clone();
        for (i, segment) in key.segments().iter().enumerate() {
            if i > 0 {
                location.push(SEPARATOR);
            }
            match self.encoding {
                SegmentEncoding::Percent => location.push_str(&urlencoding::encode(segment)),
                SegmentEncoding::Raw => location.push_str(segment),
            }
        }
        Location(location)
    }

    pub fn decode(&self, location: &Location) -> StorageResult<StorageKey> {
        let remainder = match location.as_str().strip_prefix(&self.prefix) {
            Some(remainder) => remainder,
            None => {
                let (_, remainder) =
                    location.as_str().split_once(&self.marker).ok_or_else(|| {
                        StorageError::MalformedLocation(format!(
                            "{} does not contain {:?}",
                            location, self.marker
                        ))
                    })?;
                remainder
            }
        };

        let remainder = match self.encoding {
            // Query strings (e.g. SAS tokens) are not part of the key
            SegmentEncoding::Percent => remainder.split(['?', '#']).next().unwrap_or_default(),
            SegmentEncoding::Raw => remainder,
        };

        if remainder.is_empty() {
            return Err(StorageError::MalformedLocation(format!(
                "{} has no key after {:?}",
                location, self.marker
            )));
        }

        let segments = remainder
            .split(SEPARATOR)
            .map(|segment| match self.encoding {
                SegmentEncoding::Percent => urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .map_err(|e| {
                        StorageError::MalformedLocation(format!(
                            "{} has an undecodable segment: {}",
                            location, e
                        ))
                    }),
                SegmentEncoding::Raw => Ok(segment.to_string()),
            })
            .collect::<StorageResult<Vec<String>>>()?;

        StorageKey::from_segments(segments).map_err(|e| {
            StorageError::MalformedLocation(format!("{} does not hold a valid key: {}", location, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;

    fn azure_codec() -> LocationCodec {
        LocationCodec::new(
            "https://fineract.blob.core.windows.net/fineract-documents/",
            "/fineract-documents/",
            SegmentEncoding::Percent,
        )
    }

    #[test]
    fn test_round_trip_document_key() {
        let codec = azure_codec();
        let key = keys::document_key("loans", 42, "note.txt").unwrap();
        let location = codec.encode(&key);
        assert!(location
            .as_str()
            .starts_with("https://fineract.blob.core.windows.net/fineract-documents/documents/loans/42/"));
        assert_eq!(codec.decode(&location).unwrap(), key);
    }

    #[test]
    fn test_round_trip_escapes_special_characters() {
        let codec = azure_codec();
        let key = keys::image_key(9, "my photo #1?.png").unwrap();
        let location = codec.encode(&key);
        assert!(location.as_str().contains("my%20photo%20%231%3F.png"));
        assert_eq!(codec.decode(&location).unwrap(), key);
    }

    #[test]
    fn test_missing_marker_is_malformed() {
        let codec = azure_codec();
        let location = Location::from("https://bucket.s3.eu-west-1.amazonaws.com/documents/x/1/a/b.txt");
        assert!(matches!(
            codec.decode(&location),
            Err(StorageError::MalformedLocation(_))
        ));
    }

    #[test]
    fn test_empty_key_is_malformed() {
        let codec = azure_codec();
        let location =
            Location::from("https://fineract.blob.core.windows.net/fineract-documents/");
        assert!(matches!(
            codec.decode(&location),
            Err(StorageError::MalformedLocation(_))
        ));

        let location = Location::from(
            "https://fineract.blob.core.windows.net/fineract-documents/documents//x.txt",
        );
        assert!(matches!(
            codec.decode(&location),
            Err(StorageError::MalformedLocation(_))
        ));
    }

    #[test]
    fn test_decode_uses_first_marker_and_ignores_query() {
        let codec = azure_codec();
        let location = Location::from(
            "https://fineract.blob.core.windows.net/fineract-documents/documents/fineract-documents/1/abc/x.txt?sv=2021&sig=abc",
        );
        let key = codec.decode(&location).unwrap();
        assert_eq!(key.to_string(), "documents/fineract-documents/1/abc/x.txt");
    }

    #[test]
    fn test_decode_prefers_exact_prefix() {
        let codec = LocationCodec::new(
            "http://127.0.0.1:10000/docs/docs/",
            "/docs/docs/",
            SegmentEncoding::Percent,
        );
        let key = keys::document_key("loans", 42, "note.txt").unwrap();
        let location = codec.encode(&key);
        assert!(location
            .as_str()
            .starts_with("http://127.0.0.1:10000/docs/docs/documents/loans/42/"));
        assert_eq!(codec.decode(&location).unwrap(), key);

        // Same blob reached through another host falls back to the marker
        let aliased = Location::new(location.as_str().replace("127.0.0.1:10000", "azurite:10000"));
        assert_eq!(codec.decode(&aliased).unwrap(), key);
    }

    #[test]
    fn test_raw_encoding_keeps_segments_verbatim() {
        let codec = LocationCodec::with_prefix("/var/lib/docvault/", SegmentEncoding::Raw);
        let key = keys::document_key("clients", 3, "tax return 2024.pdf").unwrap();
        let location = codec.encode(&key);
        assert!(location.as_str().ends_with("/tax return 2024.pdf"));
        assert_eq!(codec.decode(&location).unwrap(), key);
    }

    #[test]
    fn test_location_serializes_as_plain_string() {
        let location = Location::from("https://example.test/c/documents/a");
        let json = serde_json::to_string(&location).unwrap();
        assert_eq!(json, "\"https://example.test/c/documents/a\"");
    }
}

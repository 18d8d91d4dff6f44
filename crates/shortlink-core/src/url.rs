use crate::error::CoreError;
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// An absolute http(s) URL in canonical serialized form.
///
/// Normalization is whatever the WHATWG parser does on a round trip:
/// scheme and host are lower-cased, default ports dropped, an empty path
/// becomes `/`. Two submissions that normalize equal share a dedupe entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let parsed = ::url::Url::parse(raw.trim())
            .map_err(|e| CoreError::InvalidUrl(format!("'{raw}': {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CoreError::InvalidUrl(format!(
                "scheme must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(CoreError::InvalidUrl(format!("'{raw}' has no host")));
        }

        Ok(Self(parsed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hashes the normalized form for the dedupe index.
    pub fn dedupe_hash(&self) -> DedupeHash {
        DedupeHash(hex::encode(Sha256::digest(self.0.as_bytes())))
    }
}

impl Display for NormalizedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case hex SHA-256 of a [`NormalizedUrl`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupeHash(String);

impl DedupeHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DedupeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

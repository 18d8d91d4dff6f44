use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

/// The 62-symbol code alphabet: digits, lowercase, then uppercase.
///
/// Index 0 (`'0'`) is the zero digit used for left padding.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const MIN_LENGTH: usize = 6;
const MAX_LENGTH: usize = 8;
const DEFAULT_LENGTH: u8 = 7;

/// A validated short code identifier for a shortened URL.
///
/// Short codes are 6-8 characters long and drawn only from [`ALPHABET`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    /// Creates a new `ShortCode` after validating the input.
    pub fn new(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes produced by trusted internal sources
    /// (the encoder always clamps to a valid length over the alphabet).
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Generates the full shortened URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.len() < MIN_LENGTH || code.len() > MAX_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be between {} and {}, got {}",
                MIN_LENGTH,
                MAX_LENGTH,
                code.len()
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only alphanumeric characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ShortCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ShortCode::new(s).map_err(serde::de::Error::custom)
    }
}

/// Target length of generated codes, always within `[6, 8]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CodeLength(u8);

impl CodeLength {
    pub fn new(len: usize) -> Result<Self, CoreError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&len) {
            return Err(CoreError::InvalidCodeLength {
                got: len,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }
        // fits: MAX_LENGTH < u8::MAX
        Ok(Self(len as u8))
    }

    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl Default for CodeLength {
    fn default() -> Self {
        Self(DEFAULT_LENGTH)
    }
}

impl TryFrom<usize> for CodeLength {
    type Error = CoreError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

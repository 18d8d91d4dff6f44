use shortlink_core::CoreError;
use std::fmt;

/// Operator-supplied key for candidate derivation.
///
/// Opaque on purpose: it never prints, and there is no default outside
/// test and debug builds.
#[derive(Clone)]
pub struct CodeSecret(Vec<u8>);

impl CodeSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, CoreError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CoreError::InvalidSecret("secret must not be empty".to_string()));
        }
        Ok(Self(secret))
    }

    /// A fixed, publicly known secret for local development and tests.
    #[cfg(any(test, debug_assertions))]
    pub fn insecure_dev() -> Self {
        Self(b"dev-secret-change-me".to_vec())
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CodeSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CodeSecret(<redacted>)")
    }
}

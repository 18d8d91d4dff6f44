use crate::shortcode::ShortCode;
use crate::url::DedupeHash;

/// Key prefixes for the three record families kept in the store.
///
/// | Record        | Key                                  |
/// |---------------|--------------------------------------|
/// | mapping       | `{code}<ShortCode>`                  |
/// | dedupe index  | `{url}<hex sha256>`                  |
/// | rate counter  | `{rate}<origin>:<window index>`      |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    code_prefix: String,
    url_prefix: String,
    rate_prefix: String,
}

impl Keyspace {
    pub fn new(
        code_prefix: impl Into<String>,
        url_prefix: impl Into<String>,
        rate_prefix: impl Into<String>,
    ) -> Self {
        Self {
            code_prefix: code_prefix.into(),
            url_prefix: url_prefix.into(),
            rate_prefix: rate_prefix.into(),
        }
    }

    /// Prepends `namespace:` to each default prefix, for sharing one store
    /// between deployments.
    pub fn namespaced(namespace: &str) -> Self {
        let base = Self::default();
        Self::new(
            format!("{namespace}:{}", base.code_prefix),
            format!("{namespace}:{}", base.url_prefix),
            format!("{namespace}:{}", base.rate_prefix),
        )
    }

    pub fn code_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.code_prefix, code.as_str())
    }

    pub fn dedupe_key(&self, hash: &DedupeHash) -> String {
        format!("{}{}", self.url_prefix, hash.as_str())
    }

    pub fn rate_key(&self, origin: &str, window_index: i64) -> String {
        format!("{}{}:{}", self.rate_prefix, origin, window_index)
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("sl:", "url:", "rl:")
    }
}

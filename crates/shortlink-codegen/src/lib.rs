//! Candidate short-code derivation.
//!
//! Everything here is pure: a [`CandidateSource`] turns a URL and an attempt
//! index into raw bytes, and [`base62`] turns those bytes into a fixed-length
//! code. Nothing in this crate talks to a store.

pub mod base62;
pub mod keyed;
pub mod secret;

pub use keyed::HmacCandidates;
pub use secret::CodeSecret;

use shortlink_core::{CodeLength, NormalizedUrl, ShortCode};

/// Produces the raw candidate bytes for one allocation attempt.
///
/// Implementations must return different bytes for different `attempt`
/// values of the same URL, and at least `8 * 6` bits of output so any
/// [`CodeLength`] can be filled.
pub trait CandidateSource: Send + Sync + 'static {
    fn candidate(&self, url: &NormalizedUrl, attempt: u32) -> Vec<u8>;

    /// Derives the short code tried on `attempt`.
    fn candidate_code(&self, url: &NormalizedUrl, attempt: u32, length: CodeLength) -> ShortCode {
        base62::to_code(&self.candidate(url, attempt), length)
    }
}

impl<T: CandidateSource> CandidateSource for std::sync::Arc<T> {
    fn candidate(&self, url: &NormalizedUrl, attempt: u32) -> Vec<u8> {
        T::candidate(self, url, attempt)
    }
}

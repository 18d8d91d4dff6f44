use crate::secret::CodeSecret;
use crate::CandidateSource;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shortlink_core::{Clock, CoreError, NormalizedUrl, SystemClock};

type HmacSha256 = Hmac<Sha256>;

/// Keyed candidate generator.
///
/// Each candidate is `HMAC-SHA256(secret, url || now_millis || attempt)`,
/// with the timestamp and attempt written as decimal strings. The timestamp
/// spreads independent callers for the same URL over different first
/// candidates; the attempt index makes every retry within one call differ.
#[derive(Clone)]
pub struct HmacCandidates<C = SystemClock> {
    keyed: HmacSha256,
    clock: C,
}

impl HmacCandidates<SystemClock> {
    /// Creates a generator backed by the real system clock.
    pub fn new(secret: &CodeSecret) -> Result<Self, CoreError> {
        Self::with_clock(secret, SystemClock)
    }
}

impl<C: Clock> HmacCandidates<C> {
    pub fn with_clock(secret: &CodeSecret, clock: C) -> Result<Self, CoreError> {
        let keyed = HmacSha256::new_from_slice(secret.expose())
            .map_err(|e| CoreError::InvalidSecret(e.to_string()))?;
        Ok(Self { keyed, clock })
    }

    /// Computes the digest for an explicit timestamp.
    pub fn digest_at(&self, url: &NormalizedUrl, millis: i64, attempt: u32) -> [u8; 32] {
        let mut mac = self.keyed.clone();
        mac.update(url.as_str().as_bytes());
        mac.update(millis.to_string().as_bytes());
        mac.update(attempt.to_string().as_bytes());

        let mut digest = [0_u8; 32];
        digest.copy_from_slice(&mac.finalize().into_bytes());
        digest
    }
}

impl<C: Clock> CandidateSource for HmacCandidates<C> {
    fn candidate(&self, url: &NormalizedUrl, attempt: u32) -> Vec<u8> {
        self.digest_at(url, self.clock.now_millis(), attempt).to_vec()
    }
}

impl<C> std::fmt::Debug for HmacCandidates<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCandidates").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use shortlink_core::{CodeLength, ManualClock, ALPHABET};

    fn url(s: &str) -> NormalizedUrl {
        NormalizedUrl::parse(s).unwrap()
    }

    fn generator(clock: ManualClock) -> HmacCandidates<ManualClock> {
        HmacCandidates::with_clock(&CodeSecret::insecure_dev(), clock).unwrap()
    }

    #[test]
    fn same_inputs_give_same_candidate() {
        let gen = generator(ManualClock::at_millis(1_700_000_000_000));
        let target = url("https://example.com/path");
        assert_eq!(gen.candidate(&target, 0), gen.candidate(&target, 0));
    }

    #[test]
    fn attempts_explore_different_candidates() {
        let gen = generator(ManualClock::at_millis(1_700_000_000_000));
        let target = url("https://example.com/path");

        let codes: std::collections::HashSet<_> = (0..8)
            .map(|attempt| gen.candidate_code(&target, attempt, CodeLength::default()))
            .collect();
        assert_eq!(codes.len(), 8);
    }

    #[test]
    fn timestamp_changes_first_candidate() {
        let clock = ManualClock::at_millis(1_700_000_000_000);
        let gen = generator(clock.clone());
        let target = url("https://example.com/path");

        let before = gen.candidate(&target, 0);
        clock.advance(SignedDuration::from_millis(1));
        let after = gen.candidate(&target, 0);
        assert_ne!(before, after);
    }

    #[test]
    fn secret_changes_candidate() {
        let clock = ManualClock::at_millis(1_700_000_000_000);
        let a = generator(clock.clone());
        let b = HmacCandidates::with_clock(&CodeSecret::new("other").unwrap(), clock).unwrap();
        let target = url("https://example.com/path");
        assert_ne!(a.candidate(&target, 0), b.candidate(&target, 0));
    }

    #[test]
    fn output_has_enough_entropy_for_any_length() {
        let gen = generator(ManualClock::at_millis(0));
        let raw = gen.candidate(&url("https://example.com/"), 3);
        assert!(raw.len() * 8 >= 8 * 6);

        for len in 6..=8 {
            let length = CodeLength::new(len).unwrap();
            let code = gen.candidate_code(&url("https://example.com/"), 3, length);
            assert_eq!(code.as_str().len(), len);
            assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn digest_matches_manual_hmac() {
        let gen = generator(ManualClock::at_millis(42));
        let target = url("https://example.com/");

        let mut mac = HmacSha256::new_from_slice(b"dev-secret-change-me").unwrap();
        mac.update(b"https://example.com/427");
        let expected = mac.finalize().into_bytes().to_vec();

        assert_eq!(gen.candidate(&target, 7), expected);
    }
}

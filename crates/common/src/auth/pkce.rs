//! PKCE (Proof Key for Code Exchange) for the authorization-code flow
//!
//! Implements RFC 7636 S256 challenges plus the CSRF `state` token sent
//! alongside them.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const RANDOM_BYTES: usize = 32;

fn random_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// BASE64URL(SHA256(ASCII(verifier)))
pub fn code_challenge_for(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Verifier/challenge pair plus state for one authorization attempt.
#[derive(Clone)]
pub struct PkceChallenge {
    /// Kept secret until the code exchange.
    pub code_verifier: String,
    /// Sent with the authorization request.
    pub code_challenge: String,
    /// Must come back unchanged on the redirect.
    pub state: String,
}

impl PkceChallenge {
    /// 32 random bytes each for verifier and state (43 base64url chars).
    pub fn generate() -> Self {
        let code_verifier = random_token();
        let code_challenge = code_challenge_for(&code_verifier);
        Self { code_verifier, code_challenge, state: random_token() }
    }

    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }

    pub fn matches_state(&self, returned: &str) -> bool {
        self.state == returned
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"[redacted]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use super::*;

    /// Validates `PkceChallenge::generate` output shape.
    ///
    /// Assertions:
    /// - Verifier length stays within the RFC 7636 43-128 range.
    /// - No padding or non URL-safe characters are produced.
    #[test]
    fn test_generated_values_are_url_safe() {
        let challenge = PkceChallenge::generate();

        assert!((43..=128).contains(&challenge.code_verifier.len()));
        for value in [&challenge.code_verifier, &challenge.code_challenge, &challenge.state] {
            assert!(!value.contains('='));
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
        }
        assert_eq!(challenge.challenge_method(), "S256");
    }

    /// Validates that two generations never share secrets.
    #[test]
    fn test_unique_challenges() {
        let first = PkceChallenge::generate();
        let second = PkceChallenge::generate();

        assert_ne!(first.code_verifier, second.code_verifier);
        assert_ne!(first.state, second.state);
    }

    /// Validates the challenge against the RFC 7636 appendix B vector.
    #[test]
    fn test_code_challenge_matches_rfc_vector() {
        assert_eq!(
            code_challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_debug_redacts_verifier() {
        let challenge = PkceChallenge::generate();
        let rendered = format!("{challenge:?}");
        assert!(!rendered.contains(&challenge.code_verifier));
    }
}

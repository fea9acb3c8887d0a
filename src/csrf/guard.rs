//! CSRF token generation and constant-time validation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::CsrfConfig;
use crate::error::Result;

/// Guard for state-changing requests against cross-site forgery.
///
/// The guard is a pure function pair: it generates unpredictable tokens and
/// compares received vs. expected tokens in constant time. Persisting a token
/// and associating it with a session is the caller's responsibility.
pub struct CsrfGuard {
    /// Number of random bytes per token
    token_bytes: usize,
}

impl CsrfGuard {
    /// Create a guard from configuration.
    ///
    /// Fails with [`RampartError::InvalidConfiguration`] if the configured
    /// token size falls below 256 bits of entropy.
    ///
    /// [`RampartError::InvalidConfiguration`]: crate::error::RampartError::InvalidConfiguration
    pub fn new(config: CsrfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            token_bytes: config.token_bytes,
        })
    }

    /// Generate a fresh token, URL-safe base64 encoded without padding.
    ///
    /// # Panics
    ///
    /// Panics if the operating system's secure randomness source is
    /// unavailable. The guard never falls back to a weaker generator; a
    /// predictable token would defeat its entire purpose.
    pub fn generate_token(&self) -> String {
        let mut bytes = vec![0u8; self.token_bytes];
        OsRng
            .try_fill_bytes(&mut bytes)
            .expect("operating system randomness source unavailable");
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Compare a received token against the expected one.
    ///
    /// Returns `true` iff both are present, non-empty, and byte-for-byte
    /// identical. Missing input always yields `false`, never an error the
    /// caller could mishandle as "allow". The comparison visits every byte
    /// position regardless of where a mismatch occurs, so response timing
    /// reveals nothing about the expected token's content.
    pub fn validate_token(&self, received: Option<&str>, expected: Option<&str>) -> bool {
        let (Some(received), Some(expected)) = (received, expected) else {
            return false;
        };
        if received.is_empty() || expected.is_empty() {
            return false;
        }
        constant_time_eq(received.as_bytes(), expected.as_bytes())
    }
}

/// Byte-slice equality whose control flow depends only on the lengths.
///
/// Differences are XOR-folded into an accumulator instead of short-circuiting
/// at the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

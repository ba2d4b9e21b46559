//! Shared-secret verification for ingestion requests.

use std::fmt;

use serde::Deserialize;

/// The single static credential devices present as `apiKey`.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Whether no secret was configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare a presented key against the secret.
    ///
    /// Runs in time independent of where the first mismatching byte is.
    /// An absent candidate never matches, nor does anything against an empty secret.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        if self.0.is_empty() {
            return false;
        }
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

fn constant_time_eq(expected: &[u8], candidate: &[u8]) -> bool {
    // Length is not secret; the contents are.
    let mut diff = expected.len() ^ candidate.len();
    for (i, byte) in expected.iter().enumerate() {
        let other = candidate.get(i).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

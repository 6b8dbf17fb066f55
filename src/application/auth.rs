//! Static API token verification.

use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

/// Hex characters of the token digest exposed in logs.
const FINGERPRINT_LEN: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiAuthError {
    #[error("missing api token")]
    Missing,
    #[error("invalid api token")]
    Invalid,
}

/// Identity attached to authenticated requests. Never carries the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPrincipal {
    pub fingerprint: String,
}

/// Holds digests of the accepted tokens; plain tokens are dropped after construction.
#[derive(Clone)]
pub struct ApiTokenVerifier {
    digests: Vec<[u8; 32]>,
}

impl ApiTokenVerifier {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let digests = tokens
            .into_iter()
            .map(|token| token.as_ref().trim().to_string())
            .filter(|token| !token.is_empty())
            .map(|token| digest(&token))
            .collect();
        Self { digests }
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Every configured digest is compared so timing does not reveal which one matched.
    pub fn authenticate(&self, token: &str) -> Result<ApiPrincipal, ApiAuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiAuthError::Missing);
        }

        let candidate = digest(token);
        let matched = self
            .digests
            .iter()
            .fold(Choice::from(0), |found, accepted| {
                found | accepted.as_slice().ct_eq(candidate.as_slice())
            });

        if bool::from(matched) {
            Ok(ApiPrincipal {
                fingerprint: hex::encode(candidate)[..FINGERPRINT_LEN].to_string(),
            })
        } else {
            Err(ApiAuthError::Invalid)
        }
    }
}

fn digest(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

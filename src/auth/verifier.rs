//! Bearer token verification.
//!
//! Tokens are HS256 JWTs issued by the account service. The relay only
//! verifies; it never issues. A structurally valid token is necessary but
//! not sufficient for authentication — callers must also resolve the
//! account against current record-store state (see
//! [`crate::persistence::ProfileStore`]), since deactivation does not
//! invalidate outstanding tokens.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use super::Claims;
use crate::error::RelayError;

/// Verifies bearer tokens against the shared HS256 secret.
pub struct CredentialVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Creates a verifier from the shared secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidToken`] when the signature, structure,
    /// or expiry check fails. The caller keeps the connection open; the
    /// client may retry with a fresh token.
    pub fn verify(&self, token: &str) -> Result<Claims, RelayError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| RelayError::InvalidToken)
    }
}

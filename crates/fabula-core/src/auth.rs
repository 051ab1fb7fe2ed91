//! Credential verification abstraction.

use async_trait::async_trait;

use crate::error::DomainError;

/// Verifies a bearer credential and resolves it to an owner id.
///
/// Real identity-provider verification is out of scope; this seam exists so
/// one can be plugged in without touching the request paths.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns the owner id the token authenticates as.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unauthorized`] for a missing or invalid token.
    async fn verify(&self, token: &str) -> Result<String, DomainError>;
}

/// Local (credential-free) mode: the bearer token is taken verbatim as the
/// owner id. Matches the product's single-machine deployment, where the
/// client generates a stable device id and presents it as its token.
#[derive(Debug, Default)]
pub struct LocalTokenVerifier;

#[async_trait]
impl TokenVerifier for LocalTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, DomainError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DomainError::Unauthorized);
        }
        Ok(token.to_owned())
    }
}

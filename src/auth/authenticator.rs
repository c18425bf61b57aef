use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{AccessTokenStore, TokenGenerator};
use crate::error::{Error, Result};
use crate::types::AccessTokenIdentity;

/// Resolves credentials into token identities.
pub struct Authenticator {
    store: Arc<dyn AccessTokenStore>,
    generator: TokenGenerator,
}

impl Authenticator {
    pub fn new(store: Arc<dyn AccessTokenStore>) -> Self {
        Self {
            store,
            generator: TokenGenerator::new(),
        }
    }

    /// Validates a token name and raw secret.
    pub fn authenticate(&self, name: &str, secret: &str) -> Result<AccessTokenIdentity> {
        let record = self
            .store
            .find_by_name(name)?
            .ok_or_else(|| Error::unauthorized("Invalid token"))?;

        if !self.generator.verify(secret, &record.secret_hash)? {
            tracing::debug!("Rejected secret for token {name}");
            return Err(Error::unauthorized("Invalid token"));
        }

        Ok(record.identity())
    }

    /// Authenticates an Authorization header value.
    /// Returns `Ok(None)` for anonymous requests.
    pub fn authenticate_header(
        &self,
        header: Option<&str>,
    ) -> Result<Option<AccessTokenIdentity>> {
        let Some(header) = header else {
            return Ok(None);
        };

        let (name, secret) = extract_basic_credentials(header)
            .ok_or_else(|| Error::unauthorized("Invalid authorization header"))?;

        self.authenticate(&name, &secret).map(Some)
    }
}

/// Extracts (name, secret) from a Basic auth header.
/// Expects format: Basic base64(name:secret), `xBasic` is accepted as well.
pub fn extract_basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header
        .strip_prefix("Basic ")
        .or_else(|| header.strip_prefix("xBasic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    let (name, secret) = credentials.split_once(':')?;
    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), secret.to_string()))
}

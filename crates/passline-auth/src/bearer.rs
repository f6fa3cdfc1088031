//! `Authorization` header helpers.

use crate::{Error, Result};

/// Scheme prefix, including the separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the compact token from an `Authorization` header value.
///
/// The prefix match is exact and case-sensitive; whatever follows it is handed to the
/// verifier untouched.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let value = authorization.ok_or(Error::MissingAuthorization)?;
    value
        .strip_prefix(BEARER_PREFIX)
        .ok_or_else(|| Error::NotBearerScheme(value.to_string()))
}

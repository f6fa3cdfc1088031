//! Error types.

use passline_api::ErrorClass;
use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Hard failures of issuance, verification and credential extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The identity claim is absent (at issuance or after verification).
    #[error("Required claim: '{0}' missing on the JWT")]
    MissingRequiredClaim(String),

    /// Token structure could not be parsed.
    #[error("malformed JWT: {0}")]
    MalformedToken(String),

    /// The header names a key identifier the key set does not hold.
    #[error("no verification key for kid '{0}'")]
    UnknownKeyId(String),

    /// Signature does not match header and claims.
    #[error("JWT signature does not match locally computed signature")]
    InvalidSignature,

    /// `now` is at or past `exp`.
    #[error("JWT expired at {expires_at}, current time {now_ms}ms")]
    TokenExpired { expires_at: i64, now_ms: i64 },

    /// `now` is before `nbf`.
    #[error("JWT must not be accepted before {not_before}, current time {now_ms}ms")]
    TokenNotYetValid { not_before: i64, now_ms: i64 },

    /// The request carried no `Authorization` header.
    #[error("No Authorization Header on the request")]
    MissingAuthorization,

    /// The `Authorization` header does not use the bearer scheme.
    #[error("Authorization header is not a Bearer token: {0}")]
    NotBearerScheme(String),

    /// Signing key material could not be loaded or is not present.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
}

impl Error {
    /// Stable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingRequiredClaim(_) => "MissingRequiredClaim",
            Error::MalformedToken(_) => "MalformedToken",
            Error::UnknownKeyId(_) => "UnknownKeyId",
            Error::InvalidSignature => "InvalidSignature",
            Error::TokenExpired { .. } => "TokenExpired",
            Error::TokenNotYetValid { .. } => "TokenNotYetValid",
            Error::MissingAuthorization => "MissingAuthorization",
            Error::NotBearerScheme(_) => "NotBearerScheme",
            Error::KeyUnavailable(_) => "KeyUnavailable",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::MissingAuthorization | Error::NotBearerScheme(_) => ErrorClass::Authorization,
            Error::KeyUnavailable(_) => ErrorClass::Fatal,
            _ => ErrorClass::Client,
        }
    }
}

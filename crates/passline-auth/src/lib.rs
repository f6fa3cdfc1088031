//! passline-auth
//!
//! Issues and verifies short-lived RS256 identity tokens.
//!
//! - **Key material** is held in a [`KeySet`]: one active signing key plus any number of
//!   verification keys, each addressed by its key identifier (`kid`).
//! - **Issuance** ([`TokenIssuer`]) requires the `userName` claim, stamps `iat`/`nbf`/`exp`
//!   and signs with the active key.
//! - **Verification** ([`TokenVerifier`]) resolves the public key named by the token header,
//!   checks the signature, then the temporal window, then the identity claim.
//!
//! ## Quick start
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use passline_auth::{KeyEntry, KeySet, TokenIssuer, TokenVerifier};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let entry = KeyEntry::from_rsa_pem_files(
//!     "k1",
//!     Some(Path::new("keys/k1.pem")),
//!     Path::new("keys/k1.pub.pem"),
//! )?;
//! let keys = Arc::new(KeySet::new("k1", vec![entry])?);
//!
//! let issuer = TokenIssuer::new(keys.clone());
//! let verifier = TokenVerifier::new(keys);
//!
//! let claims = serde_json::json!({"userName": "anna"});
//! let signed = issuer.issue(claims.as_object().cloned().unwrap_or_default())?;
//! let verified = verifier.verify(&signed.compact)?;
//! println!("user={:?}", verified.user_name());
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod bearer;
mod claims;
mod error;
mod issuer;
mod keys;
mod time;
mod verifier;

pub use bearer::{BEARER_PREFIX, bearer_token};
pub use claims::{EXPIRES_AT, ISSUED_AT, NOT_BEFORE, identity};
pub use error::{Error, Result};
pub use issuer::{DEFAULT_TTL, SignedToken, TokenIssuer};
pub use keys::{IssuanceKey, KeyEntry, KeyMaterialProvider, KeySet, SIGNING_ALGORITHM};
pub use verifier::{TokenVerifier, VerifiedToken};

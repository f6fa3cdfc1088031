//! Token verification against a key set.
//!
//! Stages run in a fixed order and the first failure is returned: parse, resolve the key
//! named by `kid`, check the signature, check `nbf`/`exp`, check the identity claim.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Header, Validation};
use passline_api::{ClaimSet, USERNAME_CLAIM};
use serde_json::Value;

use crate::claims::{EXPIRES_AT, ISSUED_AT, NOT_BEFORE, identity, numeric_date};
use crate::keys::{KeyMaterialProvider, SIGNING_ALGORITHM};
use crate::time::unix_millis;
use crate::{Error, Result};

/// A token whose signature, temporal window and identity claim all checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The parsed header.
    pub header: Header,
    /// Every claim the token carried.
    pub claims: ClaimSet,
}

impl VerifiedToken {
    /// Get a claim by key.
    pub fn claim(&self, key: &str) -> Option<&Value> {
        self.claims.get(key)
    }

    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// The `userName` claim. Always present on a verified token.
    pub fn user_name(&self) -> &str {
        self.claim(USERNAME_CLAIM)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn issued_at(&self) -> Option<i64> {
        numeric_date(&self.claims, ISSUED_AT)
    }

    pub fn not_before(&self) -> Option<i64> {
        numeric_date(&self.claims, NOT_BEFORE)
    }

    pub fn expires_at(&self) -> Option<i64> {
        numeric_date(&self.claims, EXPIRES_AT)
    }
}

/// Verifies compact tokens. Holds no per-call state.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<dyn KeyMaterialProvider>,
}

impl TokenVerifier {
    pub fn new(keys: Arc<dyn KeyMaterialProvider>) -> Self {
        Self { keys }
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
        self.verify_at(token, SystemTime::now())
    }

    /// Verify as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: SystemTime) -> Result<VerifiedToken> {
        let header = parse(token)?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| Error::MalformedToken("header carries no kid".to_string()))?;
        let key = self.keys.resolve_verification_key(kid)?;

        let claims = check_signature(token, key)?;

        check_window(&claims, unix_millis(now))?;

        identity(&claims)?;

        Ok(VerifiedToken { header, claims })
    }
}

/// Structural checks only: three segments, a JSON header, a JSON object payload and a
/// decodable signature.
fn parse(token: &str) -> Result<Header> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| Error::MalformedToken(format!("failed to decode header: {e}")))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::MalformedToken(format!("invalid claims encoding: {e}")))?;
    serde_json::from_slice::<ClaimSet>(&payload)
        .map_err(|e| Error::MalformedToken(format!("claims are not a JSON object: {e}")))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| Error::MalformedToken(format!("invalid signature encoding: {e}")))?;
    if signature.is_empty() {
        return Err(Error::MalformedToken("signature is empty".to_string()));
    }

    Ok(header)
}

fn check_signature(token: &str, key: &DecodingKey) -> Result<ClaimSet> {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    // Temporal and identity claims are checked afterwards with millisecond precision.
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    jsonwebtoken::decode::<ClaimSet>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(map_jwt_error)
}

fn map_jwt_error(error: jsonwebtoken::errors::Error) -> Error {
    match error.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_) => Error::InvalidSignature,
        _ => Error::MalformedToken(error.to_string()),
    }
}

/// `nbf * 1000 <= now_ms < exp * 1000`.
fn check_window(claims: &ClaimSet, now_ms: i64) -> Result<()> {
    let not_before = numeric_date(claims, NOT_BEFORE)
        .ok_or_else(|| Error::MalformedToken("missing nbf claim".to_string()))?;
    let expires_at = numeric_date(claims, EXPIRES_AT)
        .ok_or_else(|| Error::MalformedToken("missing exp claim".to_string()))?;

    if now_ms < not_before.saturating_mul(1000) {
        return Err(Error::TokenNotYetValid { not_before, now_ms });
    }
    if now_ms >= expires_at.saturating_mul(1000) {
        return Err(Error::TokenExpired { expires_at, now_ms });
    }
    Ok(())
}

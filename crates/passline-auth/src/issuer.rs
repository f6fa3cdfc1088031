//! Token issuance.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::Header;
use passline_api::{ClaimSet, CompactToken, KeyId};
use serde_json::Value;

use crate::claims::{EXPIRES_AT, ISSUED_AT, NOT_BEFORE, identity};
use crate::keys::{KeyMaterialProvider, SIGNING_ALGORITHM};
use crate::time::unix_seconds;
use crate::{Error, Result};

/// Lifetime of an issued token unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// A freshly signed token together with what went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedToken {
    pub compact: CompactToken,
    pub key_id: KeyId,
    pub claims: ClaimSet,
}

impl SignedToken {
    pub fn expires_at(&self) -> Option<i64> {
        self.claims.get(EXPIRES_AT).and_then(Value::as_i64)
    }
}

/// Signs caller-supplied claims with the active key.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<dyn KeyMaterialProvider>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(keys: Arc<dyn KeyMaterialProvider>) -> Self {
        Self {
            keys,
            ttl: DEFAULT_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now for the configured lifetime.
    pub fn issue(&self, claims: ClaimSet) -> Result<SignedToken> {
        self.issue_at(claims, SystemTime::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// Caller claims are copied verbatim, except that `iat`, `nbf` and `exp` are always
    /// overwritten. Fails with [`Error::MissingRequiredClaim`] before touching any key.
    pub fn issue_at(&self, mut claims: ClaimSet, now: SystemTime) -> Result<SignedToken> {
        identity(&claims)?;

        let key = self.keys.issuance_key()?;

        let issued_at = unix_seconds(now);
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        claims.insert(ISSUED_AT.to_string(), Value::from(issued_at));
        claims.insert(NOT_BEFORE.to_string(), Value::from(issued_at));
        claims.insert(
            EXPIRES_AT.to_string(),
            Value::from(issued_at.saturating_add(ttl)),
        );

        let mut header = Header::new(SIGNING_ALGORITHM);
        header.kid = Some(key.kid.to_string());

        let compact = jsonwebtoken::encode(&header, &claims, key.key)
            .map_err(|e| Error::KeyUnavailable(format!("signing with {} failed: {e}", key.kid)))?;

        Ok(SignedToken {
            compact,
            key_id: key.kid.to_string(),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeySet;
    use crate::keys::tests::k1;
    use serde_json::json;
    use std::time::UNIX_EPOCH;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(Arc::new(KeySet::new("k1", vec![k1()]).unwrap()))
    }

    fn claims(v: Value) -> ClaimSet {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn stamps_temporal_claims() {
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_500);
        let signed = issuer()
            .issue_at(claims(json!({"userName": "anna", "role": "admin"})), now)
            .unwrap();

        assert_eq!(signed.key_id, "k1");
        assert_eq!(signed.claims["iat"], json!(1_700_000_000));
        assert_eq!(signed.claims["nbf"], json!(1_700_000_000));
        assert_eq!(signed.claims["exp"], json!(1_700_000_060));
        assert_eq!(signed.claims["role"], json!("admin"));
        assert_eq!(signed.expires_at(), Some(1_700_000_060));
        assert_eq!(signed.compact.split('.').count(), 3);

        let header = jsonwebtoken::decode_header(&signed.compact).unwrap();
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(header.alg, SIGNING_ALGORITHM);
    }

    #[test]
    fn caller_temporal_claims_are_overwritten() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        let signed = issuer()
            .issue_at(claims(json!({"userName": "anna", "exp": 99_999_999})), now)
            .unwrap();
        assert_eq!(signed.claims["exp"], json!(1_060));
    }

    #[test]
    fn ttl_is_configurable() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        let signed = issuer()
            .with_ttl(Duration::from_secs(5))
            .issue_at(claims(json!({"userName": "anna"})), now)
            .unwrap();
        assert_eq!(signed.claims["exp"], json!(1_005));
    }

    #[test]
    fn missing_identity_fails_before_signing() {
        let empty = TokenIssuer::new(Arc::new(KeySet::new("k1", Vec::new()).unwrap()));
        // The key set cannot sign, so reaching the key would report KeyUnavailable instead.
        assert_eq!(
            empty.issue(ClaimSet::new()).unwrap_err(),
            Error::MissingRequiredClaim("userName".to_string())
        );
        assert!(matches!(
            empty.issue(claims(json!({"userName": "anna"}))),
            Err(Error::KeyUnavailable(_))
        ));
    }
}

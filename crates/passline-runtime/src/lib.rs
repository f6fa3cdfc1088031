//! Wires key material, issuance, verification and account resolution into one
//! immutable [`PasslineRuntime`] and maps hard failures onto transport-ready
//! [`Rejection`]s.

mod resolver;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use passline_api::{AccountResponse, ClaimSet, ErrorClass, JwtResponse, TokenPublisher};
use passline_auth::{
    Error, KeyMaterialProvider, KeySet, SignedToken, TokenIssuer, TokenVerifier, VerifiedToken,
};
use passline_connectors::{BuiltPublisher, TokenFeed, TokenReceiver, build_publisher};
use passline_core::{AccountDirectory, PasslineConfig};

pub use resolver::AccountResolver;

/// A hard failure ready for the transport layer: how to surface it and what to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub class: ErrorClass,
    pub body: JwtResponse,
}

impl From<&Error> for Rejection {
    fn from(err: &Error) -> Self {
        Self {
            class: err.class(),
            body: JwtResponse::failure(err.kind(), err.to_string()),
        }
    }
}

/// Every component of the service, built once and shared read-only.
pub struct PasslineRuntime {
    keys: Arc<KeySet>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    resolver: AccountResolver,
    accounts: Arc<AccountDirectory>,
    publisher: Box<dyn TokenPublisher>,
    feed: Option<TokenFeed>,
}

impl PasslineRuntime {
    /// Load key material and wire the components. Key failures are fatal to the caller.
    pub fn from_config(config: PasslineConfig) -> Result<Self, Error> {
        let keys = config.keys.load()?;
        let BuiltPublisher { publisher, feed } = build_publisher(&config.publisher);
        let mut runtime = Self::from_parts(keys, config.accounts, publisher, config.token_ttl)?;
        runtime.feed = feed;
        Ok(runtime)
    }

    pub fn from_parts(
        keys: KeySet,
        accounts: AccountDirectory,
        publisher: Box<dyn TokenPublisher>,
        token_ttl: Duration,
    ) -> Result<Self, Error> {
        let keys = Arc::new(keys);
        // Fail at startup rather than on the first issuance.
        keys.issuance_key()?;

        let accounts = Arc::new(accounts);
        let issuer = TokenIssuer::new(keys.clone()).with_ttl(token_ttl);
        let verifier = TokenVerifier::new(keys.clone());
        let resolver = AccountResolver::new(verifier.clone(), accounts.clone());

        tracing::debug!(
            active_kid = keys.active_kid(),
            keys = keys.kids().count(),
            accounts = accounts.len(),
            publisher = publisher.id(),
            "runtime ready"
        );

        Ok(Self {
            keys,
            issuer,
            verifier,
            resolver,
            accounts,
            publisher,
            feed: None,
        })
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub fn resolver(&self) -> &AccountResolver {
        &self.resolver
    }

    /// Receive every token published from now on. `None` unless the publisher is a broadcast.
    pub fn subscribe(&self) -> Option<TokenReceiver> {
        self.feed.as_ref().map(TokenFeed::subscribe)
    }

    pub fn issue(&self, claims: ClaimSet) -> Result<SignedToken, Error> {
        let signed = self.issuer.issue(claims)?;
        tracing::debug!(kid = %signed.key_id, exp = ?signed.expires_at(), "token issued");
        Ok(signed)
    }

    /// Issue, then hand the token to the publisher.
    ///
    /// Issuance success depends only on signing; a failed hand-off is logged and dropped.
    pub fn issue_and_publish(&self, claims: ClaimSet) -> Result<SignedToken, Error> {
        let signed = self.issue(claims)?;
        if let Err(e) = self.publisher.publish(&signed.compact) {
            tracing::warn!(publisher = self.publisher.id(), error = %e, "token publication failed");
        }
        Ok(signed)
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedToken, Error> {
        let verified = self.verifier.verify(token)?;
        tracing::debug!(
            kid = verified.key_id(),
            user_name = verified.user_name(),
            "token verified"
        );
        Ok(verified)
    }

    pub fn verify_at(&self, token: &str, now: SystemTime) -> Result<VerifiedToken, Error> {
        self.verifier.verify_at(token, now)
    }

    pub fn resolve(&self, authorization: Option<&str>) -> Result<AccountResponse, Error> {
        self.resolver.resolve_from_request(authorization)
    }

    pub fn issue_response(&self, claims: ClaimSet) -> Result<JwtResponse, Rejection> {
        self.issue(claims)
            .map(|signed| JwtResponse::issued(signed.compact))
            .map_err(|e| reject(&e))
    }

    pub fn publish_response(&self, claims: ClaimSet) -> Result<JwtResponse, Rejection> {
        self.issue_and_publish(claims)
            .map(|signed| JwtResponse::issued(signed.compact))
            .map_err(|e| reject(&e))
    }

    pub fn verify_response(&self, token: &str) -> Result<JwtResponse, Rejection> {
        self.verify(token)
            .map(|verified| JwtResponse::verified(verified.claims))
            .map_err(|e| reject(&e))
    }

    pub fn account_response(
        &self,
        authorization: Option<&str>,
    ) -> Result<AccountResponse, Rejection> {
        self.resolve(authorization).map_err(|e| reject(&e))
    }
}

fn reject(err: &Error) -> Rejection {
    tracing::debug!(kind = err.kind(), error = %err, "request rejected");
    Rejection::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use passline_api::{PublishError, Status};
    use passline_auth::KeyEntry;
    use passline_core::demo_directory;
    use serde_json::json;
    use std::sync::Mutex;

    const K1_PRIVATE: &[u8] = include_bytes!("../../passline-auth/testdata/k1.pem");
    const K1_PUBLIC: &[u8] = include_bytes!("../../passline-auth/testdata/k1.pub.pem");

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<String>>>);

    impl TokenPublisher for Recording {
        fn id(&self) -> &str {
            "recording"
        }

        fn publish(&self, token: &str) -> Result<(), PublishError> {
            self.0.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    struct Failing;

    impl TokenPublisher for Failing {
        fn id(&self) -> &str {
            "failing"
        }

        fn publish(&self, _token: &str) -> Result<(), PublishError> {
            Err(PublishError::Delivery("broker down".to_string()))
        }
    }

    fn keys() -> KeySet {
        KeySet::new(
            "k1",
            vec![KeyEntry::from_rsa_pem("k1", Some(K1_PRIVATE), K1_PUBLIC).unwrap()],
        )
        .unwrap()
    }

    fn runtime(publisher: Box<dyn TokenPublisher>) -> PasslineRuntime {
        PasslineRuntime::from_parts(keys(), demo_directory(), publisher, Duration::from_secs(60))
            .unwrap()
    }

    fn claims(v: serde_json::Value) -> ClaimSet {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn publish_hands_off_compact_token() {
        let sink = Recording::default();
        let rt = runtime(Box::new(sink.clone()));
        let signed = rt.issue_and_publish(claims(json!({"userName": "anna"}))).unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec![signed.compact]);
    }

    #[test]
    fn publish_failure_does_not_fail_issuance() {
        let rt = runtime(Box::new(Failing));
        let response = rt
            .publish_response(claims(json!({"userName": "anna"})))
            .unwrap();
        assert_eq!(response.status, Status::Success);
        assert!(response.jwt.is_some());
    }

    #[test]
    fn issue_without_identity_is_a_client_rejection() {
        let rt = runtime(Box::new(Failing));
        let rejection = rt.issue_response(ClaimSet::new()).unwrap_err();
        assert_eq!(rejection.class, ErrorClass::Client);
        assert_eq!(rejection.body.status, Status::Error);
        assert_eq!(
            rejection.body.exception_type.as_deref(),
            Some("MissingRequiredClaim")
        );
        assert!(rejection.body.jwt.is_none());
    }

    #[test]
    fn verify_response_carries_claims() {
        let rt = runtime(Box::new(Failing));
        let signed = rt.issue(claims(json!({"userName": "colin"}))).unwrap();
        let response = rt.verify_response(&signed.compact).unwrap();
        assert_eq!(response.claims.unwrap()["userName"], json!("colin"));
    }

    #[test]
    fn runtime_without_signing_key_is_fatal() {
        let verify_only = KeySet::new(
            "k1",
            vec![KeyEntry::from_rsa_pem("k1", None, K1_PUBLIC).unwrap()],
        )
        .unwrap();
        let err = PasslineRuntime::from_parts(
            verify_only,
            demo_directory(),
            Box::new(Failing),
            Duration::from_secs(60),
        )
        .err()
        .unwrap();
        assert_eq!(Rejection::from(&err).class, ErrorClass::Fatal);
    }
}

//! Signing key material addressed by key identifier.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use passline_api::KeyId;

use crate::{Error, Result};

/// Algorithm used for every issued token.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// The active private key and the identifier written into token headers.
#[derive(Clone, Copy)]
pub struct IssuanceKey<'a> {
    pub kid: &'a str,
    pub key: &'a EncodingKey,
}

/// Source of signing and verification keys.
pub trait KeyMaterialProvider: Send + Sync {
    /// The single key new tokens are signed with.
    fn issuance_key(&self) -> Result<IssuanceKey<'_>>;

    /// The public key registered under `kid`.
    fn resolve_verification_key(&self, kid: &str) -> Result<&DecodingKey>;
}

/// One RSA key pair. Verification-only entries carry no private half.
#[derive(Clone)]
pub struct KeyEntry {
    kid: KeyId,
    signing: Option<EncodingKey>,
    verifying: DecodingKey,
}

impl KeyEntry {
    /// Build an entry from PEM-encoded RSA keys (PKCS#1 or PKCS#8).
    pub fn from_rsa_pem(
        kid: impl Into<KeyId>,
        private_pem: Option<&[u8]>,
        public_pem: &[u8],
    ) -> Result<Self> {
        let kid = kid.into();
        if kid.is_empty() {
            return Err(Error::KeyUnavailable("kid must not be empty".to_string()));
        }

        let signing = private_pem
            .map(EncodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| Error::KeyUnavailable(format!("{kid}: invalid private key: {e}")))?;
        let verifying = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| Error::KeyUnavailable(format!("{kid}: invalid public key: {e}")))?;

        Ok(Self {
            kid,
            signing,
            verifying,
        })
    }

    /// Read PEM files and build an entry.
    pub fn from_rsa_pem_files(
        kid: impl Into<KeyId>,
        private_path: Option<&Path>,
        public_path: &Path,
    ) -> Result<Self> {
        let kid = kid.into();
        let private_pem = private_path.map(|p| read_pem(&kid, p)).transpose()?;
        let public_pem = read_pem(&kid, public_path)?;
        Self::from_rsa_pem(kid, private_pem.as_deref(), &public_pem)
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn can_sign(&self) -> bool {
        self.signing.is_some()
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("kid", &self.kid)
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn read_pem(kid: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::KeyUnavailable(format!("{kid}: failed to read {}: {e}", path.display()))
    })
}

/// Immutable key set: one active issuance key plus verification keys by `kid`.
///
/// Several keys may be valid for verification at once, so a rotation only changes `active`.
#[derive(Clone)]
pub struct KeySet {
    active: KeyId,
    entries: BTreeMap<KeyId, KeyEntry>,
}

impl KeySet {
    /// Build a key set. Fails if a `kid` repeats.
    ///
    /// The active key is not checked here; [`KeyMaterialProvider::issuance_key`] reports it.
    pub fn new(active: impl Into<KeyId>, entries: Vec<KeyEntry>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entry in entries {
            let kid = entry.kid.clone();
            if map.insert(kid.clone(), entry).is_some() {
                return Err(Error::KeyUnavailable(format!("duplicate kid {kid}")));
            }
        }
        Ok(Self {
            active: active.into(),
            entries: map,
        })
    }

    pub fn active_kid(&self) -> &str {
        &self.active
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &KeyEntry> {
        self.entries.values()
    }
}

impl KeyMaterialProvider for KeySet {
    fn issuance_key(&self) -> Result<IssuanceKey<'_>> {
        let entry = self.entries.get(&self.active).ok_or_else(|| {
            Error::KeyUnavailable(format!("active kid {} is not loaded", self.active))
        })?;
        let key = entry.signing.as_ref().ok_or_else(|| {
            Error::KeyUnavailable(format!("active kid {} has no private key", self.active))
        })?;
        Ok(IssuanceKey {
            kid: &entry.kid,
            key,
        })
    }

    fn resolve_verification_key(&self, kid: &str) -> Result<&DecodingKey> {
        self.entries
            .get(kid)
            .map(|entry| &entry.verifying)
            .ok_or_else(|| Error::UnknownKeyId(kid.to_string()))
    }
}

impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet")
            .field("active", &self.active)
            .field("entries", &self.entries.values().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const K1_PRIVATE: &[u8] = include_bytes!("../testdata/k1.pem");
    pub(crate) const K1_PUBLIC: &[u8] = include_bytes!("../testdata/k1.pub.pem");
    pub(crate) const K2_PRIVATE: &[u8] = include_bytes!("../testdata/k2.pem");
    pub(crate) const K2_PUBLIC: &[u8] = include_bytes!("../testdata/k2.pub.pem");

    pub(crate) fn k1() -> KeyEntry {
        KeyEntry::from_rsa_pem("k1", Some(K1_PRIVATE), K1_PUBLIC).unwrap()
    }

    pub(crate) fn k2() -> KeyEntry {
        KeyEntry::from_rsa_pem("k2", Some(K2_PRIVATE), K2_PUBLIC).unwrap()
    }

    #[test]
    fn issuance_key_is_the_active_entry() {
        let set = KeySet::new("k2", vec![k1(), k2()]).unwrap();
        assert_eq!(set.issuance_key().unwrap().kid, "k2");
        assert_eq!(set.kids().collect::<Vec<_>>(), vec!["k1", "k2"]);
    }

    #[test]
    fn missing_active_key_is_unavailable() {
        let set = KeySet::new("k9", vec![k1()]).unwrap();
        assert!(matches!(set.issuance_key(), Err(Error::KeyUnavailable(_))));
    }

    #[test]
    fn verification_only_entry_cannot_issue() {
        let entry = KeyEntry::from_rsa_pem("k1", None, K1_PUBLIC).unwrap();
        assert!(!entry.can_sign());
        let set = KeySet::new("k1", vec![entry]).unwrap();
        assert!(matches!(set.issuance_key(), Err(Error::KeyUnavailable(_))));
        assert!(set.resolve_verification_key("k1").is_ok());
    }

    #[test]
    fn unknown_kid_does_not_resolve() {
        let set = KeySet::new("k1", vec![k1()]).unwrap();
        assert_eq!(
            set.resolve_verification_key("k2").err(),
            Some(Error::UnknownKeyId("k2".to_string()))
        );
    }

    #[test]
    fn duplicate_kid_rejected() {
        assert!(matches!(
            KeySet::new("k1", vec![k1(), k1()]),
            Err(Error::KeyUnavailable(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn bad_pem_is_unavailable() {
        assert!(matches!(
            KeyEntry::from_rsa_pem("k1", Some(b"nope"), K1_PUBLIC),
            Err(Error::KeyUnavailable(_))
        ));
        assert!(matches!(
            KeyEntry::from_rsa_pem("", None, K1_PUBLIC),
            Err(Error::KeyUnavailable(_))
        ));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = KeyEntry::from_rsa_pem_files("k1", None, Path::new("/nonexistent/k1.pub.pem"))
            .unwrap_err();
        assert_eq!(err.kind(), "KeyUnavailable");
    }
}

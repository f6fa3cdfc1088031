use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type KeyId = String;
pub type IdentityKey = String;
pub type CompactToken = String;

/// Claim name to claim value. Values are strings, numbers or NumericDate seconds.
pub type ClaimSet = Map<String, Value>;

/// The identity claim every issued and accepted token must carry.
pub const USERNAME_CLAIM: &str = "userName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Error,
}

/// How a hard failure should be surfaced by whatever transport sits in front of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The caller sent a bad token or claim set.
    Client,
    /// The request carried no usable credential.
    Authorization,
    /// The process cannot issue tokens at all.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub first_name: String,
    pub last_name: String,
    pub user_name: IdentityKey,
}

impl Account {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            user_name: user_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<CompactToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<ClaimSet>,
}

impl JwtResponse {
    pub fn issued(jwt: CompactToken) -> Self {
        Self {
            status: Status::Success,
            message: None,
            exception_type: None,
            jwt: Some(jwt),
            claims: None,
        }
    }

    pub fn verified(claims: ClaimSet) -> Self {
        Self {
            status: Status::Success,
            message: None,
            exception_type: None,
            jwt: None,
            claims: Some(claims),
        }
    }

    pub fn failure(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
            exception_type: Some(exception_type.into()),
            jwt: None,
            claims: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
}

impl AccountResponse {
    pub fn found(account: Account) -> Self {
        Self {
            status: Status::Success,
            message: "Found Account".to_string(),
            account: Some(account),
        }
    }

    pub fn not_found(user_name: &str) -> Self {
        Self {
            status: Status::Error,
            message: format!("Account with {USERNAME_CLAIM}: {user_name}, not found"),
            account: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("channel closed: {0}")]
    Closed(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Hands issued tokens to other processes. Delivery is fire-and-forget from the issuer's view.
pub trait TokenPublisher: Send + Sync {
    fn id(&self) -> &str;
    fn publish(&self, token: &str) -> Result<(), PublishError>;
}

/// Publisher settings as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub kind: PublisherKind,
    pub topic: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Attribute holding the buffer size of a broadcast publisher.
pub const CAPACITY_ATTRIBUTE: &str = "capacity";
pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

impl PublisherConfig {
    /// Broadcast buffer size, `DEFAULT_BROADCAST_CAPACITY` when unset.
    pub fn capacity(&self) -> Result<usize, String> {
        let Some(raw) = self.attributes.get(CAPACITY_ATTRIBUTE) else {
            return Ok(DEFAULT_BROADCAST_CAPACITY);
        };
        match raw.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(format!(
                "publisher attribute {CAPACITY_ATTRIBUTE} must be a positive integer, got {raw:?}"
            )),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::Log,
            topic: "passline.tokens".to_string(),
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    Log,
    /// In-process fan-out to subscribers of the running service.
    Broadcast,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_attribute() {
        let mut cfg = PublisherConfig::default();
        assert_eq!(cfg.capacity(), Ok(DEFAULT_BROADCAST_CAPACITY));

        cfg.attributes.insert(CAPACITY_ATTRIBUTE.to_string(), "4".to_string());
        assert_eq!(cfg.capacity(), Ok(4));

        for bad in ["0", "-1", "many"] {
            cfg.attributes.insert(CAPACITY_ATTRIBUTE.to_string(), bad.to_string());
            assert!(cfg.capacity().unwrap_err().contains(bad));
        }
    }

    #[test]
    fn jwt_response_skips_empty_fields() {
        let v = serde_json::to_value(JwtResponse::issued("a.b.c".to_string())).unwrap();
        assert_eq!(v, serde_json::json!({"status": "SUCCESS", "jwt": "a.b.c"}));

        let v = serde_json::to_value(JwtResponse::failure("InvalidSignature", "bad")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "status": "ERROR",
                "message": "bad",
                "exceptionType": "InvalidSignature",
            })
        );
    }

    #[test]
    fn not_found_message() {
        let r = AccountResponse::not_found("zed");
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.message, "Account with userName: zed, not found");
        assert!(r.account.is_none());
    }

    #[test]
    fn account_serializes_camel_case() {
        let v = serde_json::to_value(Account::new("Anna", "Apple", "anna")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"firstName": "Anna", "lastName": "Apple", "userName": "anna"})
        );
    }
}

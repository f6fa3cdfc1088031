//! Claim names and the identity-claim rule shared by issuance and verification.

use passline_api::{ClaimSet, USERNAME_CLAIM};
use serde_json::Value;

use crate::{Error, Result};

pub const ISSUED_AT: &str = "iat";
pub const NOT_BEFORE: &str = "nbf";
pub const EXPIRES_AT: &str = "exp";

/// Returns the `userName` claim if it is a non-empty string.
pub fn identity(claims: &ClaimSet) -> Result<&str> {
    claims
        .get(USERNAME_CLAIM)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::MissingRequiredClaim(USERNAME_CLAIM.to_string()))
}

/// Reads a NumericDate claim, accepting integral and fractional encodings.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn numeric_date(claims: &ClaimSet, name: &str) -> Option<i64> {
    let value = claims.get(name)?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(v: Value) -> ClaimSet {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn identity_requires_non_empty_string() {
        assert_eq!(identity(&claims(json!({"userName": "anna"}))), Ok("anna"));
        for bad in [json!({}), json!({"userName": ""}), json!({"userName": 7})] {
            assert!(matches!(
                identity(&claims(bad)),
                Err(Error::MissingRequiredClaim(name)) if name == "userName"
            ));
        }
    }

    #[test]
    fn numeric_dates() {
        let c = claims(json!({"exp": 100, "nbf": 99.7, "iat": "x"}));
        assert_eq!(numeric_date(&c, EXPIRES_AT), Some(100));
        assert_eq!(numeric_date(&c, NOT_BEFORE), Some(99));
        assert_eq!(numeric_date(&c, ISSUED_AT), None);
        assert_eq!(numeric_date(&c, "missing"), None);
    }
}

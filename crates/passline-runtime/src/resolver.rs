use std::sync::Arc;
use std::time::SystemTime;

use passline_api::{AccountResponse, USERNAME_CLAIM};
use passline_auth::{Result, TokenVerifier, bearer_token};
use passline_core::AccountDirectory;

/// Binds a bearer credential to an account.
///
/// Hard failures (header, token) come back as `Err` with their kind unchanged. An identity
/// that verifies but has no directory entry is a normal `Ok` with an `ERROR` envelope.
#[derive(Clone)]
pub struct AccountResolver {
    verifier: TokenVerifier,
    accounts: Arc<AccountDirectory>,
}

impl AccountResolver {
    pub fn new(verifier: TokenVerifier, accounts: Arc<AccountDirectory>) -> Self {
        Self { verifier, accounts }
    }

    pub fn resolve_from_request(&self, authorization: Option<&str>) -> Result<AccountResponse> {
        self.resolve_at(authorization, SystemTime::now())
    }

    pub fn resolve_at(
        &self,
        authorization: Option<&str>,
        now: SystemTime,
    ) -> Result<AccountResponse> {
        let token = bearer_token(authorization)?;
        let verified = self.verifier.verify_at(token, now)?;
        let user_name = verified.user_name();

        match self.accounts.lookup(user_name) {
            Some(account) => Ok(AccountResponse::found(account.clone())),
            None => {
                let response = AccountResponse::not_found(user_name);
                tracing::warn!(claim = USERNAME_CLAIM, user_name, "{}", response.message);
                Ok(response)
            }
        }
    }
}

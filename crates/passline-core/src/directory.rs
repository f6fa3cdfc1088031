use std::collections::BTreeMap;

use passline_api::{Account, IdentityKey};

use crate::ConfigError;

/// Read-only identity to account mapping, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: BTreeMap<IdentityKey, Account>,
}

impl AccountDirectory {
    /// Build a directory keyed by `user_name`. Fails if a key repeats.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for account in accounts {
            let key = account.user_name.clone();
            if key.is_empty() {
                return Err(ConfigError::Validation(
                    "account with empty userName".to_string(),
                ));
            }
            if map.insert(key.clone(), account).is_some() {
                return Err(ConfigError::Validation(format!(
                    "duplicate account userName {key}"
                )));
            }
        }
        Ok(Self { accounts: map })
    }

    /// Exact, case-sensitive lookup.
    pub fn lookup(&self, user_name: &str) -> Option<&Account> {
        self.accounts.get(user_name)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }
}

pub fn demo_directory() -> AccountDirectory {
    let accounts = [
        Account::new("Anna", "Apple", "anna"),
        Account::new("Betty", "Baker", "betty"),
        Account::new("Colin", "Cooper", "colin"),
    ];
    AccountDirectory {
        accounts: accounts
            .into_iter()
            .map(|a| (a.user_name.clone(), a))
            .collect(),
    }
}

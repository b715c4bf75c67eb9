//! [`Authenticator`] implementation backed by the in-process user table.

use super::{AuthError, Authenticator, User};
use crate::options::UserAccount;
use async_trait::async_trait;
use std::collections::HashMap;

/// Authenticates against the user table from the configuration. Password
/// comparison is constant-time so response latency does not leak how much of
/// a guess matched.
#[derive(Debug)]
pub struct LocalAuthenticator {
    accounts: HashMap<String, UserAccount>,
}

impl LocalAuthenticator {
    /// Build the authenticator from the configured user table. Accounts
    /// without a password can never log in through this backend.
    pub fn new(accounts: &[UserAccount]) -> Self {
        LocalAuthenticator {
            accounts: accounts.iter().map(|a| (a.name.clone(), a.clone())).collect(),
        }
    }
}

// Compares every byte regardless of where the first mismatch sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[async_trait]
impl Authenticator for LocalAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let account = self.accounts.get(username).ok_or(AuthError::BadUser)?;
        let expected = account.password.as_deref().ok_or(AuthError::BadPassword)?;
        if !constant_time_eq(expected.as_bytes(), password.as_bytes()) {
            return Err(AuthError::BadPassword);
        }
        Ok(User {
            name: account.name.clone(),
            home: account.home.clone(),
            ownership_override: account.ownership_override,
            read_only: account.read_only,
        })
    }
}

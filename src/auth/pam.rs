//! [`Authenticator`] implementation that authenticates against [`PAM`].
//!
//! [`PAM`]: https://en.wikipedia.org/wiki/Pluggable_authentication_module

use super::{AuthError, Authenticator, User};
use crate::options::UserAccount;
use async_trait::async_trait;
use std::collections::HashMap;

/// Authenticates against the given PAM service. The user table still decides
/// who may log in at all and supplies home directories and per-user flags;
/// only the password check is delegated.
///
/// PAM conversations block, so they run on the blocking thread pool and never
/// stall the control loop. If the session dies while a conversation is in
/// flight the result is discarded on arrival.
#[derive(Debug)]
pub struct PamAuthenticator {
    service: String,
    accounts: HashMap<String, UserAccount>,
}

impl PamAuthenticator {
    /// Initialize a new [`PamAuthenticator`] for the given PAM service.
    pub fn new<S: Into<String>>(service: S, accounts: &[UserAccount]) -> Self {
        PamAuthenticator {
            service: service.into(),
            accounts: accounts.iter().map(|a| (a.name.clone(), a.clone())).collect(),
        }
    }
}

#[async_trait]
impl Authenticator for PamAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let account = self.accounts.get(username).ok_or(AuthError::BadUser)?.clone();
        let service = self.service.clone();
        let username = username.to_string();
        let password = password.to_string();

        let verified = tokio::task::spawn_blocking(move || {
            let mut auth =
                pam_auth::Authenticator::with_password(&service).map_err(|e| AuthError::Backend(Box::new(e)))?;
            auth.get_handler().set_credentials(&username, &password);
            auth.authenticate().map_err(|_| AuthError::BadPassword)
        })
        .await
        .map_err(|e| AuthError::Backend(Box::new(e)))?;

        verified?;
        Ok(User {
            name: account.name,
            home: account.home,
            ownership_override: account.ownership_override,
            read_only: account.read_only,
        })
    }
}

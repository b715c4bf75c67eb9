//! Authentication: the backend trait, its implementations (local user table
//! and, behind the `pam_auth` feature, PAM) and the gate that combines a
//! backend with the per-IP failure counter.

mod local;
pub use local::LocalAuthenticator;

#[cfg(all(unix, feature = "pam_auth"))]
mod pam;
#[cfg(all(unix, feature = "pam_auth"))]
pub use pam::PamAuthenticator;

use crate::{
    metrics,
    options::Ownership,
    server::failed_logins::{FailedLogins, LockState},
};
use async_trait::async_trait;
use std::{fmt, net::IpAddr, path::PathBuf, sync::Arc};
use thiserror::Error;

/// An authenticated user as the rest of the server sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The login name.
    pub name: String,
    /// Host directory mapped to this user's virtual `/`.
    pub home: PathBuf,
    /// uid/gid applied to uploaded files, if configured.
    pub ownership_override: Option<Ownership>,
    /// Mutating commands reply 550 for read-only users.
    pub read_only: bool,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The error type returned by [`Authenticator`] implementations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The username is not in the user table.
    #[error("unknown user")]
    BadUser,
    /// The password did not match.
    #[error("bad password")]
    BadPassword,
    /// The backend itself failed (e.g. the PAM stack errored).
    #[error("authentication backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Defines the requirements for password-verification backends.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Authenticate the given user with the given password.
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError>;
}

/// The outcome of a gated verification attempt.
#[derive(Debug)]
pub enum Verdict {
    /// Credentials check out; the peer's failure counter was cleared.
    Success(Arc<User>),
    /// Bad credentials. When `close_session` is set the failure pushed the
    /// peer over the bruteforce threshold and the session must be torn down
    /// after the 530.
    Rejected {
        /// Close the control connection after replying.
        close_session: bool,
    },
    /// The peer is currently blocked; the backend was not consulted.
    Blocked,
}

/// Guards session establishment: consults the failure counter before the
/// backend and maintains it afterwards.
#[derive(Debug)]
pub struct AuthGate {
    authenticator: Arc<dyn Authenticator>,
    failed_logins: Arc<FailedLogins>,
}

impl AuthGate {
    pub(crate) fn new(authenticator: Arc<dyn Authenticator>, failed_logins: Arc<FailedLogins>) -> Self {
        AuthGate {
            authenticator,
            failed_logins,
        }
    }

    /// Verify `username`/`password` for a client at `peer`.
    pub async fn verify(&self, username: &str, password: &str, peer: IpAddr) -> Verdict {
        if self.failed_logins.is_blocked(peer) {
            return Verdict::Blocked;
        }
        match self.authenticator.authenticate(username, password).await {
            Ok(user) => {
                self.failed_logins.reset(peer);
                Verdict::Success(Arc::new(user))
            }
            Err(_) => {
                metrics::inc_auth_failure();
                let close_session = matches!(
                    self.failed_logins.record_failure(peer),
                    Some(LockState::MaxFailuresReached) | Some(LockState::AlreadyLocked)
                );
                Verdict::Rejected { close_session }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn gate(threshold: u32) -> AuthGate {
        let table = vec![crate::options::UserAccount {
            name: "alice".to_string(),
            password: Some("wonderland".to_string()),
            home: "/srv/ftp/alice".into(),
            ownership_override: None,
            read_only: false,
        }];
        AuthGate::new(
            Arc::new(LocalAuthenticator::new(&table)),
            Arc::new(FailedLogins::new(threshold, Duration::from_secs(300))),
        )
    }

    #[tokio::test]
    async fn success_resets_counter() {
        let gate = gate(3);
        let peer: IpAddr = "1.2.3.4".parse().unwrap();
        assert!(matches!(
            gate.verify("alice", "nope", peer).await,
            Verdict::Rejected { close_session: false }
        ));
        assert!(matches!(gate.verify("alice", "wonderland", peer).await, Verdict::Success(_)));
        // The slate is clean again: two more failures stay below the threshold.
        assert!(matches!(
            gate.verify("alice", "nope", peer).await,
            Verdict::Rejected { close_session: false }
        ));
        assert!(matches!(
            gate.verify("alice", "nope", peer).await,
            Verdict::Rejected { close_session: false }
        ));
    }

    #[tokio::test]
    async fn third_failure_closes_and_blocks() {
        let gate = gate(3);
        let peer: IpAddr = "1.2.3.4".parse().unwrap();
        assert!(matches!(
            gate.verify("alice", "a", peer).await,
            Verdict::Rejected { close_session: false }
        ));
        assert!(matches!(
            gate.verify("alice", "b", peer).await,
            Verdict::Rejected { close_session: false }
        ));
        assert!(matches!(
            gate.verify("alice", "c", peer).await,
            Verdict::Rejected { close_session: true }
        ));
        // Once blocked the backend is no longer consulted, even with the right password.
        assert!(matches!(gate.verify("alice", "wonderland", peer).await, Verdict::Blocked));
    }
}

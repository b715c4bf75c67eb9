//! Contains the configuration structure consumed by the [`Server`](crate::Server)
//! and the defaults that apply when fields are left out.
//!
//! The configuration *file* format and its parser are the embedder's business;
//! this crate only consumes the deserialized structure.

use serde::Deserialize;
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    ops::RangeInclusive,
    path::PathBuf,
    time::Duration,
};

pub(crate) const DEFAULT_GREETING: &str = "featherftp server ready";
pub(crate) const DEFAULT_CONTROL_PORT: u16 = 2121;
pub(crate) const DEFAULT_MAX_SESSIONS: usize = 512;
pub(crate) const DEFAULT_MAX_SESSIONS_PER_IP: u32 = 6;
pub(crate) const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub(crate) const DEFAULT_ACCEPT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_PASSIVE_PORTS: RangeInclusive<u16> = 49152..=65534;
pub(crate) const DEFAULT_BRUTEFORCE_THRESHOLD: u32 = 3;
pub(crate) const DEFAULT_BRUTEFORCE_COOLDOWN_SECS: u64 = 300;

/// Which backend verifies passwords.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthBackend {
    /// The in-process user table ([`Config::users`]) with plaintext passwords.
    Local,
    /// Delegate password verification to PAM. The user table still supplies
    /// home directories and per-user flags; its `password` fields are ignored.
    Pam {
        /// The PAM service name to authenticate against.
        service: String,
    },
}

impl Default for AuthBackend {
    fn default() -> Self {
        AuthBackend::Local
    }
}

/// uid/gid applied to files created by a user on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Ownership {
    /// Numeric user id the uploaded file will be chowned to.
    pub uid: u32,
    /// Numeric group id the uploaded file will be chowned to.
    pub gid: u32,
}

/// A single entry of the user table.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAccount {
    /// Login name.
    pub name: String,
    /// Plaintext password. Required for [`AuthBackend::Local`], ignored for PAM.
    #[serde(default)]
    pub password: Option<String>,
    /// Host directory that this user sees as virtual `/`.
    pub home: PathBuf,
    /// Optional uid/gid applied to files this user uploads.
    #[serde(default)]
    pub ownership_override: Option<Ownership>,
    /// Read-only users get 550 on every mutating command.
    #[serde(default)]
    pub read_only: bool,
}

/// Paths to the PEM encoded certificate chain and private key that enable
/// explicit TLS (AUTH TLS).
#[derive(Debug, Clone, Deserialize)]
pub struct TlsOptions {
    /// PEM file holding the certificate chain.
    pub cert_path: PathBuf,
    /// PEM file holding the private key (PKCS#8 or RSA).
    pub key_path: PathBuf,
}

/// Server configuration. All fields have serviceable defaults except the user
/// table, which starts empty (nobody can log in until it is filled).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IPv4 (or IPv6) address + port of the control channel.
    pub bind_addr: SocketAddr,
    /// Optional second control socket, typically the IPv6 counterpart.
    pub bind_addr_v6: Option<SocketAddr>,
    /// Global cap on concurrent sessions. When reached, accepting is deferred
    /// until a session ends, not rejected.
    pub max_sessions: usize,
    /// Cap on concurrent sessions per client IP. Violations get a 421.
    pub max_sessions_per_ip: u32,
    /// Control-channel idle timeout in seconds; on expiry the session gets a
    /// 421 and is closed.
    pub idle_timeout_secs: u64,
    /// How long a passive listener waits for the client's data connection.
    pub accept_timeout_secs: u64,
    /// The port range passive listeners are drawn from.
    pub passive_ports: RangeInclusive<u16>,
    /// Address to advertise in PASV replies, for servers behind NAT.
    pub nat_ip: Option<Ipv4Addr>,
    /// Enables AUTH TLS when set.
    pub tls: Option<TlsOptions>,
    /// Refuse USER/PASS on a plaintext control channel.
    pub force_tls: bool,
    /// Which backend verifies passwords.
    pub auth: AuthBackend,
    /// The user table.
    pub users: Vec<UserAccount>,
    /// Failed PASS attempts from one IP before it is blocked.
    pub bruteforce_threshold: u32,
    /// Seconds (counted from the first failure) an IP stays blocked.
    pub bruteforce_cooldown_secs: u64,
    /// First line the client sees, after the 220 code.
    pub greeting: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_CONTROL_PORT),
            bind_addr_v6: None,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_sessions_per_ip: DEFAULT_MAX_SESSIONS_PER_IP,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            accept_timeout_secs: DEFAULT_ACCEPT_TIMEOUT_SECS,
            passive_ports: DEFAULT_PASSIVE_PORTS,
            nat_ip: None,
            tls: None,
            force_tls: false,
            auth: AuthBackend::default(),
            users: Vec::new(),
            bruteforce_threshold: DEFAULT_BRUTEFORCE_THRESHOLD,
            bruteforce_cooldown_secs: DEFAULT_BRUTEFORCE_COOLDOWN_SECS,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl Config {
    pub(crate) fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub(crate) fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.accept_timeout_secs)
    }

    pub(crate) fn bruteforce_cooldown(&self) -> Duration {
        Duration::from_secs(self.bruteforce_cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.max_sessions_per_ip, 6);
        assert_eq!(config.bruteforce_threshold, 3);
        assert_eq!(config.idle_timeout_secs, 300);
        assert!(config.users.is_empty());
        assert_eq!(config.auth, AuthBackend::Local);
    }

    #[test]
    fn deserializes_from_json() {
        let raw = r#"{
            "bind_addr": "10.0.0.5:21",
            "passive_ports": { "start": 50000, "end": 50099 },
            "auth": "local",
            "users": [
                { "name": "admin", "password": "admin123", "home": "/srv/ftp/admin" },
                { "name": "guest", "home": "/srv/ftp/pub", "read_only": true }
            ]
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.bind_addr.port(), 21);
        assert_eq!(config.passive_ports, 50000..=50099);
        assert_eq!(config.users.len(), 2);
        assert!(config.users[1].read_only);
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }
}

//! Temporarily remembers failed logins per client IP so bruteforce attempts
//! can be cut off at the door.

use super::shutdown;
use slog::Logger;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u32,
    first_fail: Instant,
}

/// What a freshly recorded failure means for the peer.
#[derive(Debug, PartialEq, Eq)]
pub enum LockState {
    /// This failure reached the threshold; the peer is blocked from now on.
    MaxFailuresReached,
    /// The peer was already blocked when this failure arrived.
    AlreadyLocked,
}

/// Per-IP failure counters. Blocking starts at `threshold` failures and lasts
/// until `cooldown` has elapsed since the *first* failure, after which the
/// entry resets. One plain mutex; every critical section is a map operation.
#[derive(Debug)]
pub struct FailedLogins {
    threshold: u32,
    cooldown: Duration,
    entries: Mutex<HashMap<IpAddr, Entry>>,
}

impl FailedLogins {
    pub fn new(threshold: u32, cooldown: Duration) -> FailedLogins {
        FailedLogins {
            threshold,
            cooldown,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether connections/logins from this IP are currently refused.
    /// Expired entries reset lazily here.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&ip) {
            Some(entry) if entry.first_fail.elapsed() >= self.cooldown => {
                entries.remove(&ip);
                false
            }
            Some(entry) => entry.count >= self.threshold,
            None => false,
        }
    }

    /// Record a failed login. Returns the lock state when the peer is (now or
    /// already) blocked.
    pub fn record_failure(&self, ip: IpAddr) -> Option<LockState> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(ip).or_insert(Entry {
            count: 0,
            first_fail: Instant::now(),
        });
        if entry.first_fail.elapsed() >= self.cooldown {
            entry.count = 0;
            entry.first_fail = Instant::now();
        }
        entry.count += 1;
        if entry.count == self.threshold {
            Some(LockState::MaxFailuresReached)
        } else if entry.count > self.threshold {
            Some(LockState::AlreadyLocked)
        } else {
            None
        }
    }

    /// Clear the counter for a peer that authenticated successfully.
    pub fn reset(&self, ip: IpAddr) {
        self.entries.lock().unwrap().remove(&ip);
    }

    /// Periodically sweeps expired entries so the map does not grow without
    /// bound under a wide scan.
    pub async fn sweeper(&self, logger: Logger, mut shutdown_listener: shutdown::Listener) {
        let interval = Duration::from_secs(10);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let mut entries = self.entries.lock().unwrap();
                    let before = entries.len();
                    entries.retain(|_, entry| entry.first_fail.elapsed() < self.cooldown);
                    let swept = before - entries.len();
                    drop(entries);
                    if swept > 0 {
                        slog::debug!(logger, "Swept {} expired failed-login entries", swept);
                    }
                }
                _ = shutdown_listener.listen() => {
                    slog::info!(logger, "Failed-logins sweeper received shutdown signal");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn blocks_at_threshold() {
        let cache = FailedLogins::new(3, Duration::from_secs(300));
        assert_eq!(cache.record_failure(ip("1.2.3.4")), None);
        assert_eq!(cache.record_failure(ip("1.2.3.4")), None);
        assert!(!cache.is_blocked(ip("1.2.3.4")));
        assert_eq!(cache.record_failure(ip("1.2.3.4")), Some(LockState::MaxFailuresReached));
        assert!(cache.is_blocked(ip("1.2.3.4")));
        assert_eq!(cache.record_failure(ip("1.2.3.4")), Some(LockState::AlreadyLocked));
    }

    #[test]
    fn counters_are_per_ip() {
        let cache = FailedLogins::new(2, Duration::from_secs(300));
        cache.record_failure(ip("1.2.3.4"));
        cache.record_failure(ip("1.2.3.4"));
        assert!(cache.is_blocked(ip("1.2.3.4")));
        assert!(!cache.is_blocked(ip("5.6.7.8")));
    }

    #[test]
    fn reset_clears_the_slate() {
        let cache = FailedLogins::new(2, Duration::from_secs(300));
        cache.record_failure(ip("1.2.3.4"));
        cache.reset(ip("1.2.3.4"));
        assert_eq!(cache.record_failure(ip("1.2.3.4")), None);
    }

    #[test]
    fn cooldown_expires_the_block() {
        let cache = FailedLogins::new(1, Duration::from_millis(10));
        cache.record_failure(ip("1.2.3.4"));
        assert!(cache.is_blocked(ip("1.2.3.4")));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.is_blocked(ip("1.2.3.4")));
        // After expiry the count starts over.
        assert_eq!(cache.record_failure(ip("1.2.3.4")), Some(LockState::MaxFailuresReached));
    }
}

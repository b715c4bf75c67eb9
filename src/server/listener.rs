//! Accepts control connections and hands them off to session control loops,
//! enforcing the global session cap (by deferring accepts), the per-IP cap
//! (421) and the failed-logins block (silent close).

use super::{controlchan, failed_logins::FailedLogins, shutdown, ServerError};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Tracks how many live sessions each client IP has.
#[derive(Debug)]
pub struct IpTracker {
    max_per_ip: u32,
    counts: Mutex<HashMap<IpAddr, u32>>,
}

impl IpTracker {
    pub fn new(max_per_ip: u32) -> Arc<IpTracker> {
        Arc::new(IpTracker {
            max_per_ip,
            counts: Mutex::new(HashMap::new()),
        })
    }

    /// Claim a session slot for `ip`, unless the per-IP cap is reached.
    pub fn try_register(self: &Arc<Self>, ip: IpAddr) -> Option<IpGuard> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(ip).or_insert(0);
        if *count >= self.max_per_ip {
            return None;
        }
        *count += 1;
        Some(IpGuard {
            tracker: Arc::clone(self),
            ip,
        })
    }
}

/// Releases its IP's slot on drop.
#[derive(Debug)]
pub struct IpGuard {
    tracker: Arc<IpTracker>,
    ip: IpAddr,
}

impl Drop for IpGuard {
    fn drop(&mut self) {
        let mut counts = self.tracker.counts.lock().unwrap();
        if let Some(count) = counts.get_mut(&self.ip) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.ip);
            }
        }
    }
}

/// The capacity tickets a session holds for its whole life: one global slot
/// and one per-IP slot. Dropped (and thereby released) when the session's
/// control loop task ends.
#[derive(Debug)]
pub struct SessionTickets {
    pub permit: OwnedSemaphorePermit,
    pub ip_guard: IpGuard,
}

// Listens for control channel connections and spawns a control loop task for
// each incoming connection that passes the gates.
pub struct Listener {
    pub bind_address: SocketAddr,
    pub bind_address_v6: Option<SocketAddr>,
    pub logger: slog::Logger,
    pub loop_config: controlchan::LoopConfig,
    pub shutdown_topic: Arc<shutdown::Notifier>,
    pub failed_logins: Arc<FailedLogins>,
    pub max_sessions: usize,
    pub max_sessions_per_ip: u32,
}

impl Listener {
    // Starts listening; returns an error if an address could not be bound.
    pub async fn listen(self) -> Result<(), ServerError> {
        let Listener {
            bind_address,
            bind_address_v6,
            logger,
            loop_config,
            shutdown_topic,
            failed_logins,
            max_sessions,
            max_sessions_per_ip,
        } = self;

        let listener = TcpListener::bind(bind_address).await.map_err(ServerError::Bind)?;
        let listener_v6 = match bind_address_v6 {
            Some(addr) => Some(TcpListener::bind(addr).await.map_err(ServerError::Bind)?),
            None => None,
        };
        slog::info!(logger, "Listening on {}", bind_address);

        let session_slots = Arc::new(Semaphore::new(max_sessions));
        let ip_tracker = IpTracker::new(max_sessions_per_ip);
        let mut shutdown_listener = shutdown_topic.subscribe();
        let mut backoff = ACCEPT_BACKOFF_START;

        loop {
            // The permit comes first: with the house full we stop accepting
            // until a session ends, we do not accept-and-reject.
            let permit = tokio::select! {
                permit = Arc::clone(&session_slots).acquire_owned() => {
                    permit.expect("session semaphore never closes")
                }
                _ = shutdown_listener.listen() => return Ok(()),
            };

            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                accepted = accept_optional(&listener_v6) => accepted,
                _ = shutdown_listener.listen() => return Ok(()),
            };

            match accepted {
                Ok((tcp_stream, peer)) => {
                    backoff = ACCEPT_BACKOFF_START;
                    slog::info!(logger, "Incoming control connection from {}", peer);

                    if failed_logins.is_blocked(peer.ip()) {
                        // No reply at all for blocked peers.
                        slog::info!(logger, "Refusing connection from blocked address {}", peer.ip());
                        continue;
                    }

                    let ip_guard = match ip_tracker.try_register(peer.ip()) {
                        Some(guard) => guard,
                        None => {
                            slog::info!(logger, "Too many connections from {}", peer.ip());
                            reject_over_cap(tcp_stream, &logger);
                            continue;
                        }
                    };

                    let tickets = SessionTickets { permit, ip_guard };
                    let result =
                        controlchan::spawn_loop(loop_config.clone(), tcp_stream, shutdown_topic.subscribe(), tickets)
                            .await;
                    if let Err(err) = result {
                        slog::error!(logger, "Could not spawn control loop for {}: {}", peer, err);
                    }
                }
                Err(err) => {
                    slog::error!(logger, "Error accepting control connection: {}", err);
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, ACCEPT_BACKOFF_MAX);
                }
            }
        }
    }
}

async fn accept_optional(listener: &Option<TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

// Too many connections from one address: one 421 line, then close. The
// socket never reaches the codec, so write the raw reply here.
fn reject_over_cap(mut tcp_stream: TcpStream, logger: &slog::Logger) {
    let logger = logger.clone();
    tokio::spawn(async move {
        if let Err(err) = tcp_stream
            .write_all(b"421 Too many connections from your address\r\n")
            .await
        {
            slog::debug!(logger, "Could not send 421 to over-cap client: {}", err);
        }
        let _ = tcp_stream.shutdown().await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ip_tracker_caps_and_releases() {
        let tracker = IpTracker::new(2);
        let ip: IpAddr = "1.2.3.4".parse().unwrap();
        let first = tracker.try_register(ip).unwrap();
        let _second = tracker.try_register(ip).unwrap();
        assert!(tracker.try_register(ip).is_none());
        drop(first);
        assert!(tracker.try_register(ip).is_some());
    }

    #[test]
    fn ip_tracker_is_per_ip() {
        let tracker = IpTracker::new(1);
        let _a = tracker.try_register("1.2.3.4".parse().unwrap()).unwrap();
        assert!(tracker.try_register("5.6.7.8".parse().unwrap()).is_some());
        assert_eq!(tracker.counts.lock().unwrap().len(), 2);
    }
}

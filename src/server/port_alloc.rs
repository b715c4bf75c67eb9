//! Hands out passive-mode data ports from the configured range.

use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpSocket};

// How many connections may sit unaccepted on a passive listener. One data
// connection is expected per listener; a little slack absorbs retries.
const PASSIVE_BACKLOG: u32 = 8;

/// Thread-safe port ledger. A linear scan starts from a rotating cursor and
/// returns the first port whose bind succeeds; the mutex guards only cursor
/// and held-set updates, never the bind itself.
#[derive(Debug)]
pub struct PortAllocator {
    range: RangeInclusive<u16>,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    cursor: u16,
    held: HashSet<u16>,
}

/// Scoped hold on one passive port. Dropping the lease returns the port to
/// the free pool, so a session can never leak a port past its own end.
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    allocator: Arc<PortAllocator>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.allocator.inner.lock().unwrap().held.remove(&self.port);
    }
}

impl PortAllocator {
    pub fn new(range: RangeInclusive<u16>) -> Arc<PortAllocator> {
        let cursor = *range.start();
        Arc::new(PortAllocator {
            range,
            inner: Mutex::new(Inner {
                cursor,
                held: HashSet::new(),
            }),
        })
    }

    /// Bind a listener on some free port of the range at `ip`. Returns `None`
    /// when the whole range is exhausted (every port held or unbindable).
    pub fn acquire(self: &Arc<Self>, ip: IpAddr) -> Option<(TcpListener, PortLease)> {
        let span = usize::from(*self.range.end() - *self.range.start()) + 1;
        for _ in 0..span {
            let candidate = {
                let mut inner = self.inner.lock().unwrap();
                let candidate = inner.cursor;
                inner.cursor = if candidate >= *self.range.end() {
                    *self.range.start()
                } else {
                    candidate + 1
                };
                if inner.held.contains(&candidate) {
                    continue;
                }
                candidate
            };
            match bind(ip, candidate) {
                Ok(listener) => {
                    self.inner.lock().unwrap().held.insert(candidate);
                    let lease = PortLease {
                        port: candidate,
                        allocator: Arc::clone(self),
                    };
                    return Some((listener, lease));
                }
                Err(_) => continue,
            }
        }
        None
    }
}

fn bind(ip: IpAddr, port: u16) -> io::Result<TcpListener> {
    let socket = match ip {
        IpAddr::V4(_) => TcpSocket::new_v4()?,
        IpAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::new(ip, port))?;
    socket.listen(PASSIVE_BACKLOG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOCALHOST: IpAddr = IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn acquires_distinct_ports() {
        let alloc = PortAllocator::new(40100..=40109);
        let (_l1, lease1) = alloc.acquire(LOCALHOST).unwrap();
        let (_l2, lease2) = alloc.acquire(LOCALHOST).unwrap();
        assert_ne!(lease1.port(), lease2.port());
        assert!((40100..=40109).contains(&lease1.port()));
        assert!((40100..=40109).contains(&lease2.port()));
    }

    #[tokio::test]
    async fn exhaustion_returns_none() {
        let alloc = PortAllocator::new(40110..=40111);
        let one = alloc.acquire(LOCALHOST).unwrap();
        let two = alloc.acquire(LOCALHOST).unwrap();
        assert!(alloc.acquire(LOCALHOST).is_none());
        drop(one);
        assert!(alloc.acquire(LOCALHOST).is_some());
        drop(two);
    }

    #[tokio::test]
    async fn dropping_the_lease_frees_the_port() {
        let alloc = PortAllocator::new(40120..=40120);
        let (listener, lease) = alloc.acquire(LOCALHOST).unwrap();
        let port = lease.port();
        drop(listener);
        drop(lease);
        let (_listener, lease) = alloc.acquire(LOCALHOST).unwrap();
        assert_eq!(lease.port(), port);
    }
}

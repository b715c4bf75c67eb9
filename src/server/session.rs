//! Per-connection session state. The session owns every resource tied to the
//! connection (data intents, port leases, the transfer cancel handle), so all
//! of it is released when the session goes out of scope, whatever the exit
//! path was.

use super::datachan::transfer::TransferCancel;
use super::port_alloc::PortLease;
use crate::auth::User;
use crate::fs::PathResolver;
use crate::metrics;
use crate::server::tls::FtpsConfig;
use std::fmt::Formatter;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

// TraceId is an identifier used to correlate log statements together.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct TraceId(u64);

impl TraceId {
    pub fn new() -> Self {
        let mut raw = [0u8; 8];
        // Zero on the unlikely error path; the id is for log correlation only.
        let _ = getrandom::getrandom(&mut raw);
        TraceId(u64::from_be_bytes(raw))
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Where the session is in the login conversation.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SessionState {
    /// Nothing yet; only USER (and the session-level commands) make sense.
    AwaitUser,
    /// USER was given, PASS must follow.
    AwaitPass,
    /// Login complete.
    Authenticated,
}

/// How file payloads are (un)translated on the wire.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TransferType {
    Ascii,
    Binary,
}

/// A bound passive listener waiting for the client's data connection,
/// together with the lease that returns its port on drop.
#[derive(Debug)]
pub struct PassiveSocket {
    pub listener: TcpListener,
    pub lease: PortLease,
}

/// The client's declared plan for the next data connection.
#[derive(Debug)]
pub enum DataIntent {
    /// We listen (PASV/EPSV).
    Passive(PassiveSocket),
    /// We dial out (PORT/EPRT).
    Active { peer: SocketAddr },
}

/// Handle on the one transfer worker a session may have in flight.
#[derive(Debug)]
pub struct TransferHandle {
    pub cancel: Arc<TransferCancel>,
}

// The session is shared between the control loop and command handlers via an
// asynchronous lock.
pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// State for one FTP session.
#[derive(Debug)]
pub struct Session {
    pub trace_id: TraceId,
    /// Address of the connected client.
    pub source: SocketAddr,
    pub state: SessionState,
    /// The username from USER while we wait for PASS.
    pub pending_user: Option<String>,
    /// Account details once authenticated.
    pub user: Option<Arc<User>>,
    /// Resolver rooted at the user's home; present once authenticated.
    pub resolver: Option<PathResolver>,
    /// Virtual working directory, always absolute and normalized.
    pub cwd: PathBuf,
    pub transfer_type: TransferType,
    /// One-shot REST offset for the next RETR/STOR/APPE.
    pub start_pos: u64,
    /// Host path recorded by RNFR; only RNTO may consume it.
    pub rename_from: Option<PathBuf>,
    /// Pending PASV listener or PORT target. A new PASV/EPSV/PORT/EPRT
    /// discards the previous value.
    pub data_intent: Option<DataIntent>,
    /// The active transfer worker, if any. At most one per session.
    pub transfer: Option<TransferHandle>,
    /// Whether TLS is available and with which server configuration.
    pub ftps_config: FtpsConfig,
    /// True while the control channel runs over TLS.
    pub cmd_tls: bool,
    /// True when PROT P is in effect: data connections are TLS-wrapped at open.
    pub data_tls: bool,
}

impl Session {
    pub fn new(source: SocketAddr, ftps_config: FtpsConfig) -> Self {
        metrics::inc_session();
        Session {
            trace_id: TraceId::new(),
            source,
            state: SessionState::AwaitUser,
            pending_user: None,
            user: None,
            resolver: None,
            cwd: PathBuf::from("/"),
            transfer_type: TransferType::Binary,
            start_pos: 0,
            rename_from: None,
            data_intent: None,
            transfer: None,
            ftps_config,
            cmd_tls: false,
            data_tls: false,
        }
    }

    /// Whether a transfer worker is currently attached to this session.
    pub fn data_busy(&self) -> bool {
        self.transfer.is_some()
    }

    /// Ask the running transfer worker, if any, to unwind.
    pub fn cancel_transfer(&mut self) {
        if let Some(handle) = &self.transfer {
            handle.cancel.trigger();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // A worker that outlives the control loop must still unwind promptly.
        self.cancel_transfer();
        metrics::dec_session();
    }
}

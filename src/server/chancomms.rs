//! Messages travelling from data-channel workers (and command handlers) back
//! to a session's control loop.

use std::io;
use thiserror::Error;

/// How a transfer worker failed. The control loop maps each variant to its
/// FTP reply code.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The file side failed (open, read, write): 550.
    #[error("file error: {0}")]
    File(#[source] io::Error),
    /// The data connection failed mid-transfer: 426.
    #[error("data connection error: {0}")]
    DataConnection(#[source] io::Error),
    /// Anything local that is neither: 451.
    #[error("local error: {0}")]
    Local(String),
}

/// Messages processed by the control channel loop between (and after)
/// client commands.
#[derive(Debug)]
pub enum ControlChanMsg {
    /// The control channel must be upgraded to TLS now (reply to AUTH TLS was
    /// already queued).
    SecureControlChannel,
    /// Tear the control loop down (QUIT, bruteforce lockout, fatal state).
    ExitControlLoop,
    /// The worker streamed a file to the client.
    SentData { bytes: u64 },
    /// The worker stored a file from the client.
    ReceivedData { bytes: u64 },
    /// The worker finished sending a directory listing.
    ListingSent,
    /// The worker unwound after a cancellation request.
    TransferAborted,
    /// Follows `TransferAborted` so the 226 lands after the 426.
    AbortAcknowledged,
    /// The worker failed; the payload decides the reply code.
    TransferFailed(TransferError),
    /// Result of an authentication attempt that ran off the control path.
    AuthOutcome(AuthOutcome),
}

/// The data needed to answer a PASS command once the backend is done.
#[derive(Debug)]
pub enum AuthOutcome {
    /// 230, enter the authenticated state.
    Granted {
        user: std::sync::Arc<crate::auth::User>,
        resolver: crate::fs::PathResolver,
    },
    /// 530 and stay in AwaitUser.
    Denied,
    /// 530, then close the control connection (threshold crossed or peer
    /// already blocked).
    DeniedAndClose,
}

//! Shared plumbing for the command handlers: per-session path resolution,
//! read-only enforcement and the common begin-a-transfer sequence.

use crate::{
    fs::Resolved,
    server::{
        controlchan::{
            error::ControlChanError,
            handler::CommandContext,
            Reply, ReplyCode,
        },
        datachan::{self, transfer::TransferCancel, TransferJob},
        session::{TransferHandle, TransferType},
    },
};
use std::sync::Arc;

/// Resolve a client path against the session's root and cwd. The error side
/// is the reply to send: path problems all look like a plain 550 so the tree
/// above the root stays invisible.
pub(super) async fn resolve(args: &CommandContext, path: &str) -> Result<Resolved, Reply> {
    let session = args.session.lock().await;
    let resolver = match &session.resolver {
        Some(resolver) => resolver.clone(),
        None => return Err(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate")),
    };
    let cwd = session.cwd.clone();
    drop(session);
    resolver
        .resolve(&cwd, path)
        .await
        .map_err(|_| Reply::new(ReplyCode::FileError, "No such file or directory"))
}

/// `Some(reply)` when the session user may not modify the filesystem.
pub(super) async fn deny_read_only(args: &CommandContext) -> Option<Reply> {
    let session = args.session.lock().await;
    match &session.user {
        Some(user) if user.read_only => Some(Reply::new(ReplyCode::FileError, "Permission denied")),
        _ => None,
    }
}

/// The common tail of every data command: take the session's data intent,
/// turn it into a connected (possibly TLS) stream, spawn the worker and
/// reply 150. Failures to establish the connection all answer 425.
pub(super) async fn begin_transfer(
    args: &CommandContext,
    job: TransferJob,
    started_text: &str,
) -> Result<Reply, ControlChanError> {
    let mut session = args.session.lock().await;
    let intent = match session.data_intent.take() {
        Some(intent) => intent,
        None => return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Use PASV or PORT first")),
    };
    let tls = if session.data_tls { session.ftps_config.acceptor() } else { None };
    let ascii = session.transfer_type == TransferType::Ascii;
    drop(session);

    let stream = match datachan::open_data_stream(intent, args.accept_timeout, tls).await {
        Ok(stream) => stream,
        Err(err) => {
            slog::warn!(args.logger, "Could not establish data connection: {}", err);
            return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Can't open data connection"));
        }
    };

    let cancel = TransferCancel::new();
    args.session.lock().await.transfer = Some(TransferHandle {
        cancel: Arc::clone(&cancel),
    });
    datachan::spawn_worker(
        args.logger.clone(),
        job,
        stream,
        ascii,
        cancel,
        args.tx_control_chan.clone(),
    );
    Ok(Reply::new(ReplyCode::FileStatusOkay, started_text))
}

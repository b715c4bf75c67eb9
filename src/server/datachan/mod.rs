//! The data channel: obtaining a connected (and possibly TLS-wrapped) data
//! stream from the session's declared intent, and the worker task that runs
//! one transfer over it.

pub mod ascii;
pub mod transfer;

use self::transfer::{copy_in, copy_out, CopyEnd, TransferCancel};
use super::chancomms::{ControlChanMsg, TransferError};
use super::port_alloc::PortLease;
use super::session::{DataIntent, PassiveSocket};
use crate::options::Ownership;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::Sender;
use tokio_rustls::TlsAcceptor;

/// What the session failed to arrange; every variant answers 425.
#[derive(Debug, Error)]
pub enum DataChanError {
    #[error("no data connection was established in time")]
    Timeout,
    #[error("could not open the data connection: {0}")]
    Io(#[from] io::Error),
    #[error("TLS handshake on the data connection failed: {0}")]
    Tls(io::Error),
}

pub trait DataIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> DataIo for T {}

/// A connected data stream. Passive streams keep their port lease alive until
/// the transfer is over; dropping the stream both closes the socket and frees
/// the port.
pub struct DataStream {
    io: Box<dyn DataIo>,
    _lease: Option<PortLease>,
}

/// Turn the session's data intent into a connected stream: accept on the
/// passive listener or dial the stored active-mode peer, both bounded by
/// `timeout`, then wrap in TLS when PROT P is in effect.
#[tracing_attributes::instrument(skip(tls))]
pub async fn open_data_stream(
    intent: DataIntent,
    timeout: Duration,
    tls: Option<TlsAcceptor>,
) -> Result<DataStream, DataChanError> {
    let (tcp, lease) = match intent {
        DataIntent::Passive(PassiveSocket { listener, lease }) => {
            let (tcp, _peer) = tokio::time::timeout(timeout, listener.accept())
                .await
                .map_err(|_| DataChanError::Timeout)??;
            // The listener can go; the lease keeps the port out of the pool
            // until the transfer completes.
            (tcp, Some(lease))
        }
        DataIntent::Active { peer } => {
            let tcp = tokio::time::timeout(timeout, TcpStream::connect(peer))
                .await
                .map_err(|_| DataChanError::Timeout)??;
            (tcp, None)
        }
    };
    let io: Box<dyn DataIo> = match tls {
        Some(acceptor) => Box::new(acceptor.accept(tcp).await.map_err(DataChanError::Tls)?),
        None => Box::new(tcp),
    };
    Ok(DataStream { io, _lease: lease })
}

/// One unit of work for a transfer worker.
pub enum TransferJob {
    /// RETR: stream this (already opened and seeked) file out.
    SendFile { file: tokio::fs::File },
    /// LIST/NLST/MLSD: stream a preformatted listing out.
    SendListing { bytes: Vec<u8> },
    /// STOR/APPE/STOU: stream the socket into this file.
    Receive {
        file: tokio::fs::File,
        host_path: PathBuf,
        ownership: Option<Ownership>,
    },
}

/// Spawn the worker task for one transfer. The worker owns the stream and the
/// job, never touches the control stream, and reports through `tx`.
pub fn spawn_worker(
    logger: slog::Logger,
    job: TransferJob,
    stream: DataStream,
    ascii: bool,
    cancel: Arc<TransferCancel>,
    tx: Sender<ControlChanMsg>,
) {
    tokio::spawn(async move {
        let msg = run_job(&logger, job, stream, ascii, &cancel).await;
        if let Err(err) = tx.send(msg).await {
            slog::warn!(logger, "Session ended before the transfer result could be delivered: {}", err);
        }
    });
}

async fn run_job(
    logger: &slog::Logger,
    job: TransferJob,
    stream: DataStream,
    ascii: bool,
    cancel: &TransferCancel,
) -> ControlChanMsg {
    let DataStream { mut io, _lease } = stream;
    match job {
        TransferJob::SendFile { mut file } => match copy_out(&mut file, &mut io, ascii, cancel).await {
            CopyEnd::Done { bytes } => {
                if let Err(err) = io.shutdown().await {
                    slog::warn!(logger, "Could not shut down the data stream after sending: {}", err);
                }
                ControlChanMsg::SentData { bytes }
            }
            CopyEnd::Aborted => ControlChanMsg::TransferAborted,
            CopyEnd::SourceError(e) => ControlChanMsg::TransferFailed(TransferError::File(e)),
            CopyEnd::SinkError(e) => ControlChanMsg::TransferFailed(TransferError::DataConnection(e)),
        },
        TransferJob::SendListing { bytes } => {
            let mut cursor = std::io::Cursor::new(bytes);
            // Listings are formatted with CRLF already; no ASCII translation.
            match copy_out(&mut cursor, &mut io, false, cancel).await {
                CopyEnd::Done { .. } => {
                    if let Err(err) = io.shutdown().await {
                        slog::warn!(logger, "Could not shut down the data stream after listing: {}", err);
                    }
                    ControlChanMsg::ListingSent
                }
                CopyEnd::Aborted => ControlChanMsg::TransferAborted,
                CopyEnd::SourceError(e) => ControlChanMsg::TransferFailed(TransferError::Local(e.to_string())),
                CopyEnd::SinkError(e) => ControlChanMsg::TransferFailed(TransferError::DataConnection(e)),
            }
        }
        TransferJob::Receive {
            mut file,
            host_path,
            ownership,
        } => match copy_in(&mut io, &mut file, ascii, cancel).await {
            CopyEnd::Done { bytes } => {
                // Close before applying ownership so the chown sees the final file.
                drop(file);
                if let Some(ownership) = ownership {
                    if let Err(err) = crate::fs::apply_ownership(&host_path, ownership) {
                        slog::warn!(logger, "Could not apply ownership override to {:?}: {}", host_path, err);
                    }
                }
                ControlChanMsg::ReceivedData { bytes }
            }
            // Partial uploads are retained on abort, per standard FTP semantics.
            CopyEnd::Aborted => ControlChanMsg::TransferAborted,
            CopyEnd::SourceError(e) => ControlChanMsg::TransferFailed(TransferError::DataConnection(e)),
            CopyEnd::SinkError(e) => ControlChanMsg::TransferFailed(TransferError::File(e)),
        },
    }
}

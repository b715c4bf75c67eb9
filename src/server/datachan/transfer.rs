//! The transfer engine: copies between a file (or in-memory listing) and a
//! data stream in fixed-size chunks, honoring cancellation between and
//! *during* chunk I/O so an ABOR takes effect promptly even when the peer
//! has stopped reading or writing.

use super::ascii::{AsciiDecoder, AsciiEncoder};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;

/// Transfers move data in chunks of this size; cancellation is observed at
/// least once per chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Shared cancellation flag for one transfer. The atomic answers "are we
/// cancelled", the notify wakes a worker blocked in socket or file I/O.
#[derive(Debug, Default)]
pub struct TransferCancel {
    flag: AtomicBool,
    notify: Notify,
}

impl TransferCancel {
    pub fn new() -> Arc<TransferCancel> {
        Arc::new(TransferCancel::default())
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the transfer has been cancelled.
    pub async fn triggered(&self) {
        loop {
            if self.is_triggered() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

/// How one copy run ended. The caller decides which side was the file and
/// which the data connection.
#[derive(Debug)]
pub enum CopyEnd {
    Done { bytes: u64 },
    Aborted,
    SourceError(io::Error),
    SinkError(io::Error),
}

/// Copy from a local source (file, listing buffer) to the data stream,
/// optionally applying ASCII translation.
pub async fn copy_out<R, W>(src: &mut R, dst: &mut W, ascii: bool, cancel: &TransferCancel) -> CopyEnd
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut encoder = ascii.then(AsciiEncoder::new);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut translated: Vec<u8> = Vec::new();
    let mut bytes: u64 = 0;
    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.triggered() => return CopyEnd::Aborted,
            read = src.read(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => return CopyEnd::SourceError(e),
            },
        };
        if n == 0 {
            break;
        }
        let chunk: &[u8] = match &mut encoder {
            Some(encoder) => {
                translated.clear();
                encoder.encode(&buf[..n], &mut translated);
                &translated
            }
            None => &buf[..n],
        };
        let written = tokio::select! {
            biased;
            _ = cancel.triggered() => return CopyEnd::Aborted,
            w = dst.write_all(chunk) => w,
        };
        if let Err(e) = written {
            return CopyEnd::SinkError(e);
        }
        bytes += n as u64;
    }
    if let Err(e) = dst.flush().await {
        return CopyEnd::SinkError(e);
    }
    CopyEnd::Done { bytes }
}

/// Copy from the data stream into a local file, optionally applying ASCII
/// translation.
pub async fn copy_in<R, W>(src: &mut R, dst: &mut W, ascii: bool, cancel: &TransferCancel) -> CopyEnd
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut decoder = ascii.then(AsciiDecoder::new);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut translated: Vec<u8> = Vec::new();
    let mut bytes: u64 = 0;
    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.triggered() => return CopyEnd::Aborted,
            read = src.read(&mut buf) => match read {
                Ok(n) => n,
                Err(e) => return CopyEnd::SourceError(e),
            },
        };
        if n == 0 {
            break;
        }
        let chunk: &[u8] = match &mut decoder {
            Some(decoder) => {
                translated.clear();
                decoder.decode(&buf[..n], &mut translated);
                &translated
            }
            None => &buf[..n],
        };
        let written = tokio::select! {
            biased;
            _ = cancel.triggered() => return CopyEnd::Aborted,
            w = dst.write_all(chunk) => w,
        };
        if let Err(e) = written {
            return CopyEnd::SinkError(e);
        }
        bytes += n as u64;
    }
    if let Some(decoder) = &mut decoder {
        translated.clear();
        decoder.finish(&mut translated);
        if !translated.is_empty() {
            if let Err(e) = dst.write_all(&translated).await {
                return CopyEnd::SinkError(e);
            }
        }
    }
    if let Err(e) = dst.flush().await {
        return CopyEnd::SinkError(e);
    }
    CopyEnd::Done { bytes }
}

//! The RFC 959 Retrieve (`RETR`) command

use super::support;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;
use tokio::io::AsyncSeekExt;

#[derive(Debug)]
pub struct Retr {
    path: String,
}

impl Retr {
    pub fn new(path: String) -> Self {
        Retr { path }
    }
}

#[async_trait]
impl CommandHandler for Retr {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        // The REST offset is consumed whether or not the transfer succeeds.
        let offset = {
            let mut session = args.session.lock().await;
            std::mem::take(&mut session.start_pos)
        };

        let mut file = match tokio::fs::File::open(&resolved.host).await {
            Ok(file) => file,
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        };
        match file.metadata().await {
            Ok(md) if md.is_file() => {}
            _ => return Ok(Reply::new(ReplyCode::FileError, "Not a regular file")),
        }
        if offset > 0 && file.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
            return Ok(Reply::new(ReplyCode::FileError, "Could not seek to restart offset"));
        }

        support::begin_transfer(&args, TransferJob::SendFile { file }, "Opening data connection").await
    }
}

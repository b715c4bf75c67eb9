//! The RFC 959 List (`LIST`) command

use super::support;
use crate::fs::list::{self, ListOptions};
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;

#[derive(Debug)]
pub struct List {
    flags: String,
    path: Option<String>,
}

impl List {
    pub fn new(flags: String, path: Option<String>) -> Self {
        List { flags, path }
    }
}

#[async_trait]
impl CommandHandler for List {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let target = self.path.as_deref().unwrap_or(".");
        let resolved = match support::resolve(&args, target).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        let md = match tokio::fs::metadata(&resolved.host).await {
            Ok(md) => md,
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        };
        let bytes = if md.is_dir() {
            match list::list(&resolved.host, ListOptions::from_flags(&self.flags)).await {
                Ok(bytes) => bytes,
                Err(_) => return Ok(Reply::new(ReplyCode::LocalError, "Could not read directory")),
            }
        } else {
            match list::stat_line(&resolved.host).await {
                Ok(line) => format!("{}\r\n", line).into_bytes(),
                Err(_) => return Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
            }
        };
        support::begin_transfer(
            &args,
            TransferJob::SendListing { bytes },
            "Opening data connection for directory listing",
        )
        .await
    }
}

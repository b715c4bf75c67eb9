//! The RFC 959 Name List (`NLST`) command

use super::support;
use crate::fs::list;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Nlst {
    path: Option<String>,
}

impl Nlst {
    pub fn new(path: Option<String>) -> Self {
        Nlst { path }
    }
}

#[async_trait]
impl CommandHandler for Nlst {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let target = self.path.as_deref().unwrap_or(".");
        let resolved = match support::resolve(&args, target).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        let bytes = match list::name_list(&resolved.host).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        };
        support::begin_transfer(
            &args,
            TransferJob::SendListing { bytes },
            "Opening data connection for name list",
        )
        .await
    }
}

//! The RFC 3659 File Size (`SIZE`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Size {
    path: String,
}

impl Size {
    pub fn new(path: String) -> Self {
        Size { path }
    }
}

#[async_trait]
impl CommandHandler for Size {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::metadata(&resolved.host).await {
            Ok(md) if md.is_file() => Ok(Reply::new_with_string(ReplyCode::FileStatus, md.len().to_string())),
            Ok(_) => Ok(Reply::new(ReplyCode::FileError, "Not a regular file")),
            Err(_) => Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        }
    }
}

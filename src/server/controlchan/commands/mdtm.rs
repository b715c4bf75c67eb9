//! The RFC 3659 Modify Time (`MDTM`) command

use super::support;
use crate::fs::list::modify_timestamp;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Mdtm {
    path: String,
}

impl Mdtm {
    pub fn new(path: String) -> Self {
        Mdtm { path }
    }
}

#[async_trait]
impl CommandHandler for Mdtm {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::metadata(&resolved.host).await {
            Ok(md) => Ok(Reply::new_with_string(ReplyCode::FileStatus, modify_timestamp(&md))),
            Err(_) => Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        }
    }
}

//! The RFC 959 Change Working Directory (`CWD`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Cwd {
    path: String,
}

impl Cwd {
    pub fn new(path: String) -> Self {
        Cwd { path }
    }
}

#[async_trait]
impl CommandHandler for Cwd {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        change_directory(&args, &self.path).await
    }
}

// Shared with CDUP.
pub(super) async fn change_directory(args: &CommandContext, path: &str) -> Result<Reply, ControlChanError> {
    let resolved = match support::resolve(args, path).await {
        Ok(resolved) => resolved,
        Err(reply) => return Ok(reply),
    };
    match tokio::fs::metadata(&resolved.host).await {
        Ok(md) if md.is_dir() => {
            args.session.lock().await.cwd = resolved.virtual_path;
            Ok(Reply::new(ReplyCode::FileActionOkay, "Directory changed"))
        }
        Ok(_) => Ok(Reply::new(ReplyCode::FileError, "Not a directory")),
        Err(_) => Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
    }
}

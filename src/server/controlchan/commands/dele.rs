//! The RFC 959 Delete (`DELE`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Dele {
    path: String,
}

impl Dele {
    pub fn new(path: String) -> Self {
        Dele { path }
    }
}

#[async_trait]
impl CommandHandler for Dele {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::remove_file(&resolved.host).await {
            Ok(()) => {
                slog::info!(args.logger, "Deleted {:?}", resolved.virtual_path);
                Ok(Reply::new(ReplyCode::FileActionOkay, "File deleted"))
            }
            Err(_) => Ok(Reply::new(ReplyCode::FileError, "Could not delete file")),
        }
    }
}

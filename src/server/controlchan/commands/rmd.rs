//! The RFC 959 Remove Directory (`RMD`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Rmd {
    path: String,
}

impl Rmd {
    pub fn new(path: String) -> Self {
        Rmd { path }
    }
}

#[async_trait]
impl CommandHandler for Rmd {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::remove_dir(&resolved.host).await {
            Ok(()) => {
                slog::info!(args.logger, "Removed directory {:?}", resolved.virtual_path);
                Ok(Reply::new(ReplyCode::FileActionOkay, "Directory removed"))
            }
            Err(_) => Ok(Reply::new(ReplyCode::FileError, "Could not remove directory")),
        }
    }
}

//! The RFC 959 Rename From (`RNFR`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Rnfr {
    path: String,
}

impl Rnfr {
    pub fn new(path: String) -> Self {
        Rnfr { path }
    }
}

#[async_trait]
impl CommandHandler for Rnfr {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        if tokio::fs::symlink_metadata(&resolved.host).await.is_err() {
            return Ok(Reply::new(ReplyCode::FileError, "No such file or directory"));
        }
        // Armed for exactly one RNTO; the dispatcher disarms it on any other
        // following command.
        args.session.lock().await.rename_from = Some(resolved.host);
        Ok(Reply::new(ReplyCode::FileActionPending, "Ready for RNTO"))
    }
}

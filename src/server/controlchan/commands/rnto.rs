//! The RFC 959 Rename To (`RNTO`) command

use super::support;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Rnto {
    path: String,
}

impl Rnto {
    pub fn new(path: String) -> Self {
        Rnto { path }
    }
}

#[async_trait]
impl CommandHandler for Rnto {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let source = match args.session.lock().await.rename_from.take() {
            Some(source) => source,
            None => return Ok(Reply::new(ReplyCode::BadCommandSequence, "Send RNFR first")),
        };
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::rename(&source, &resolved.host).await {
            Ok(()) => {
                slog::info!(args.logger, "Renamed {:?} to {:?}", source, resolved.host);
                Ok(Reply::new(ReplyCode::FileActionOkay, "Rename successful"))
            }
            Err(_) => Ok(Reply::new(ReplyCode::FileError, "Could not rename")),
        }
    }
}

//! The RFC 959 Status (`STAT`) command.
//
// Without an argument this reports session status on the control channel and
// is one of the few commands served while a transfer runs. With an argument
// it acts like a LIST that bypasses the data channel.

use super::support;
use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::TransferType,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Stat {
    path: Option<String>,
}

impl Stat {
    pub fn new(path: Option<String>) -> Self {
        Stat { path }
    }
}

#[async_trait]
impl CommandHandler for Stat {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        match &self.path {
            None => {
                let session = args.session.lock().await;
                let user_line = match &session.user {
                    Some(user) => format!("Logged in as {}", user),
                    None => "Waiting for login".to_string(),
                };
                let type_line = match session.transfer_type {
                    TransferType::Ascii => "TYPE: ASCII",
                    TransferType::Binary => "TYPE: Binary",
                };
                let transfer_line = if session.data_busy() {
                    "A file transfer is in progress"
                } else {
                    "No file transfer in progress"
                };
                let lines = vec![
                    format!("Status for {}", session.source),
                    user_line,
                    type_line.to_string(),
                    transfer_line.to_string(),
                    "End of status".to_string(),
                ];
                Ok(Reply::new_multiline(ReplyCode::SystemStatus, lines))
            }
            Some(path) => {
                let resolved = match support::resolve(&args, path).await {
                    Ok(resolved) => resolved,
                    Err(reply) => return Ok(reply),
                };
                match crate::fs::list::stat_line(&resolved.host).await {
                    Ok(line) => Ok(Reply::new_multiline(
                        ReplyCode::FileStatus,
                        vec!["Status follows:".to_string(), line, "End of status".to_string()],
                    )),
                    Err(_) => Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
                }
            }
        }
    }
}

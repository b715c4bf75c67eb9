//! The RFC 3659 Restart of Interrupted Transfer (`REST`) command.
//
// The offset applies to exactly one following RETR, STOR or APPE and is
// cleared by the dispatcher on any unrelated command.

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Rest {
    offset: u64,
}

impl Rest {
    pub fn new(offset: u64) -> Self {
        Rest { offset }
    }
}

#[async_trait]
impl CommandHandler for Rest {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        args.session.lock().await.start_pos = self.offset;
        Ok(Reply::new_with_string(
            ReplyCode::FileActionPending,
            format!("Restarting at {}. Now send STORE or RETRIEVE", self.offset),
        ))
    }
}

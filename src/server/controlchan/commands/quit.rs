//! The RFC 959 Logout (`QUIT`) command.
//
// An unexpected close on the control connection has the effect of an ABOR
// plus a QUIT; the session's teardown covers both.

use crate::server::{
    chancomms::ControlChanMsg,
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Quit;

#[async_trait]
impl CommandHandler for Quit {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        // The 221 goes out first; the loop exits when it processes this.
        args.notify(ControlChanMsg::ExitControlLoop);
        Ok(Reply::new(ReplyCode::ClosingControlConnection, "Bye"))
    }
}

//! The RFC 4217 Protection Buffer Size (`PBSZ`) command.
//
// For TLS the only meaningful buffer size is 0; anything else is negotiated
// down to it.

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Pbsz;

#[async_trait]
impl CommandHandler for Pbsz {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        if !session.cmd_tls {
            return Ok(Reply::new(ReplyCode::BadCommandSequence, "PBSZ requires a secured control channel"));
        }
        Ok(Reply::new(ReplyCode::CommandOkay, "PBSZ=0"))
    }
}

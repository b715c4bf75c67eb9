//! The RFC 4217 Data Channel Protection Level (`PROT`) command.

use crate::server::controlchan::{
    command::ProtParam,
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Prot {
    param: ProtParam,
}

impl Prot {
    pub fn new(param: ProtParam) -> Self {
        Prot { param }
    }
}

#[async_trait]
impl CommandHandler for Prot {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if !session.cmd_tls {
            return Ok(Reply::new(ReplyCode::BadCommandSequence, "PROT requires a secured control channel"));
        }
        match self.param {
            ProtParam::Private => {
                // Applies to data connections from their open onwards; a
                // listener bound earlier is unaffected until then.
                session.data_tls = true;
                Ok(Reply::new(ReplyCode::CommandOkay, "Data channel protection level set to private"))
            }
            ProtParam::Clear => {
                session.data_tls = false;
                Ok(Reply::new(ReplyCode::CommandOkay, "Data channel protection level set to clear"))
            }
            ProtParam::Safe | ProtParam::Confidential => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "Only C and P protection levels are supported",
            )),
        }
    }
}

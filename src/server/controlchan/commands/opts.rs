//! The RFC 2389 Options (`OPTS`) command

use crate::server::controlchan::{
    command::Opt,
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Opts {
    option: Opt,
}

impl Opts {
    pub fn new(option: Opt) -> Self {
        Opts { option }
    }
}

#[async_trait]
impl CommandHandler for Opts {
    async fn handle(&self, _args: CommandContext) -> Result<Reply, ControlChanError> {
        match self.option {
            // Path names are UTF-8 whether the client asks or not.
            Opt::Utf8 { .. } => Ok(Reply::new(ReplyCode::CommandOkay, "Always in UTF-8 mode")),
            Opt::Other => Ok(Reply::new(ReplyCode::ParameterSyntaxError, "Option not recognized")),
        }
    }
}

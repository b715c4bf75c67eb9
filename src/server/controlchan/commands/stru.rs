//! The RFC 959 File Structure (`STRU`) command

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Stru {
    param: char,
}

impl Stru {
    pub fn new(param: char) -> Self {
        Stru { param }
    }
}

#[async_trait]
impl CommandHandler for Stru {
    async fn handle(&self, _args: CommandContext) -> Result<Reply, ControlChanError> {
        match self.param {
            'F' => Ok(Reply::new(ReplyCode::CommandOkay, "File structure")),
            _ => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "Only file structure is supported",
            )),
        }
    }
}

//! The RFC 959 Transfer Mode (`MODE`) command

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Mode {
    param: char,
}

impl Mode {
    pub fn new(param: char) -> Self {
        Mode { param }
    }
}

#[async_trait]
impl CommandHandler for Mode {
    async fn handle(&self, _args: CommandContext) -> Result<Reply, ControlChanError> {
        match self.param {
            'S' => Ok(Reply::new(ReplyCode::CommandOkay, "Stream mode")),
            _ => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "Only stream mode is supported",
            )),
        }
    }
}

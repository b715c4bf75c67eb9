//! The RFC 959 Representation Type (`TYPE`) command

use crate::server::{
    controlchan::{
        command::TypeParam,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::TransferType,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Type {
    param: TypeParam,
}

impl Type {
    pub fn new(param: TypeParam) -> Self {
        Type { param }
    }
}

#[async_trait]
impl CommandHandler for Type {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        match self.param {
            TypeParam::Ascii => {
                session.transfer_type = TransferType::Ascii;
                Ok(Reply::new(ReplyCode::CommandOkay, "Switching to ASCII mode"))
            }
            TypeParam::Binary => {
                session.transfer_type = TransferType::Binary;
                Ok(Reply::new(ReplyCode::CommandOkay, "Switching to binary mode"))
            }
            TypeParam::Other => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "Only TYPE A and TYPE I are supported",
            )),
        }
    }
}

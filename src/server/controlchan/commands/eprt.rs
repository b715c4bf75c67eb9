//! The RFC 2428 Extended Data Port (`EPRT`) command.

use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::DataIntent,
};
use async_trait::async_trait;
use std::net::SocketAddr;

#[derive(Debug)]
pub struct Eprt {
    peer: SocketAddr,
}

impl Eprt {
    pub fn new(peer: SocketAddr) -> Self {
        Eprt { peer }
    }
}

#[async_trait]
impl CommandHandler for Eprt {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        args.session.lock().await.data_intent = Some(DataIntent::Active { peer: self.peer });
        Ok(Reply::new(ReplyCode::CommandOkay, "EPRT command successful"))
    }
}

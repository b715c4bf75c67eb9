//! The RFC 959 Data Port (`PORT`) command.
//
// PORT h1,h2,h3,h4,p1,p2 stores the client's address; the server dials out
// when the transfer command arrives.

use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::DataIntent,
};
use async_trait::async_trait;
use std::net::{SocketAddr, SocketAddrV4};

#[derive(Debug)]
pub struct Port {
    peer: SocketAddrV4,
}

impl Port {
    pub fn new(peer: SocketAddrV4) -> Self {
        Port { peer }
    }
}

#[async_trait]
impl CommandHandler for Port {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        args.session.lock().await.data_intent = Some(DataIntent::Active {
            peer: SocketAddr::V4(self.peer),
        });
        Ok(Reply::new(ReplyCode::CommandOkay, "PORT command successful"))
    }
}

//! The RFC 2428 Extended Passive Mode (`EPSV`) command.
//
// Like PASV but address-family agnostic: the reply only names the port and
// the client connects to the same address the control channel uses.

use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::{DataIntent, PassiveSocket},
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Epsv;

#[async_trait]
impl CommandHandler for Epsv {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let (listener, lease) = match args.port_allocator.acquire(args.local_addr.ip()) {
            Some(bound) => bound,
            None => return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Out of passive ports")),
        };
        let port = lease.port();

        args.session.lock().await.data_intent = Some(DataIntent::Passive(PassiveSocket { listener, lease }));

        Ok(Reply::new_with_string(
            ReplyCode::EnteringExtendedPassiveMode,
            format!("Entering Extended Passive Mode (|||{}|)", port),
        ))
    }
}

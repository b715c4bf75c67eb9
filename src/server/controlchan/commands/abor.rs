//! The RFC 959 Abort (`ABOR`) command.
//
// With a transfer in flight the worker closes its data socket and the client
// sees 426 followed by 226; both arrive through the completion channel so
// they stay ordered with everything else.

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Abor;

#[async_trait]
impl CommandHandler for Abor {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        if session.data_busy() {
            slog::info!(args.logger, "Aborting active transfer");
            session.cancel_transfer();
            Ok(Reply::none())
        } else {
            Ok(Reply::new(ReplyCode::ClosingDataConnection, "No transfer to abort"))
        }
    }
}

//! The RFC 4217 `AUTH` command used to upgrade the control channel to TLS.
//!
//! A client requests TLS with AUTH TLS and then decides if it wishes to
//! secure the data connections by use of the PBSZ and PROT commands.

use crate::server::{
    chancomms::ControlChanMsg,
    controlchan::{
        command::AuthParam,
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Auth {
    protocol: AuthParam,
}

impl Auth {
    pub fn new(protocol: AuthParam) -> Self {
        Auth { protocol }
    }
}

#[async_trait]
impl CommandHandler for Auth {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        match (args.tls_configured, &self.protocol) {
            (true, AuthParam::Tls) => {
                // The 234 goes out in plaintext first; the loop performs the
                // handshake when it processes this message.
                args.notify(ControlChanMsg::SecureControlChannel);
                Ok(Reply::new(ReplyCode::AuthOkayNoDataNeeded, "Upgrading to TLS"))
            }
            (true, AuthParam::Ssl) => Ok(Reply::new(
                ReplyCode::CommandNotImplementedForParameter,
                "AUTH SSL is not supported",
            )),
            (false, _) => Ok(Reply::new(ReplyCode::CommandNotImplemented, "TLS is not configured")),
        }
    }
}

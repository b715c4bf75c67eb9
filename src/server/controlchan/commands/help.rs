//! The RFC 959 Help (`HELP`) command

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn handle(&self, _args: CommandContext) -> Result<Reply, ControlChanError> {
        let text = vec![
            "Recognized commands:",
            " USER PASS QUIT SYST FEAT HELP NOOP AUTH PBSZ PROT",
            " PWD CWD CDUP TYPE STRU MODE OPTS STAT ALLO",
            " DELE RMD MKD RNFR RNTO SIZE MDTM",
            " PASV EPSV PORT EPRT REST ABOR",
            " RETR STOR STOU APPE LIST NLST MLSD",
            "Help OK",
        ];
        Ok(Reply::new_multiline(ReplyCode::HelpMessage, text))
    }
}

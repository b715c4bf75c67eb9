//! The RFC 2389 Feature (`FEAT`) command

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Feat;

#[async_trait]
impl CommandHandler for Feat {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        // Each feature line must be indented by a space.
        let mut feat_text = vec![" EPRT", " EPSV", " MDTM", " MLSD", " REST STREAM", " SIZE", " UTF8"];
        if args.tls_configured {
            feat_text.push(" AUTH TLS");
            feat_text.push(" PBSZ");
            feat_text.push(" PROT");
        }
        feat_text.sort_unstable();
        feat_text.insert(0, "Extensions supported:");
        feat_text.push("END");
        Ok(Reply::new_multiline(ReplyCode::SystemStatus, feat_text))
    }
}

//! The RFC 959 Print Working Directory (`PWD`) command

use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Pwd;

#[async_trait]
impl CommandHandler for Pwd {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        // Embedded quotes are doubled per RFC 959 appendix II.
        let cwd = session.cwd.display().to_string().replace('"', "\"\"");
        Ok(Reply::new_with_string(
            ReplyCode::DirCreated,
            format!("\"{}\" is the current directory", cwd),
        ))
    }
}

//! The RFC 959 Change To Parent Directory (`CDUP`) command

use super::cwd::change_directory;
use crate::server::controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Cdup;

#[async_trait]
impl CommandHandler for Cdup {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        change_directory(&args, "..").await
    }
}

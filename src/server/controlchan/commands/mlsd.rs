//! The RFC 3659 Machine List Directory (`MLSD`) command.
//
// Each entry is a machine-readable fact list, much easier for clients to
// parse than the traditional LIST output.

use super::support;
use crate::fs::list;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Mlsd {
    path: Option<String>,
}

impl Mlsd {
    pub fn new(path: Option<String>) -> Self {
        Mlsd { path }
    }
}

#[async_trait]
impl CommandHandler for Mlsd {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let target = self.path.as_deref().unwrap_or(".");
        let resolved = match support::resolve(&args, target).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        match tokio::fs::metadata(&resolved.host).await {
            Ok(md) if md.is_dir() => {}
            Ok(_) => return Ok(Reply::new(ReplyCode::ParameterSyntaxError, "MLSD requires a directory")),
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "No such file or directory")),
        }
        let writable = {
            let session = args.session.lock().await;
            session.user.as_ref().map(|u| !u.read_only).unwrap_or(false)
        };
        let bytes = match list::machine_list(&resolved.host, &resolved.virtual_path, writable).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(Reply::new(ReplyCode::LocalError, "Could not read directory")),
        };
        support::begin_transfer(
            &args,
            TransferJob::SendListing { bytes },
            "Opening data connection for MLSD",
        )
        .await
    }
}

//! The RFC 959 Append (`APPE`) command

use super::support;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;
use tokio::io::AsyncSeekExt;

#[derive(Debug)]
pub struct Appe {
    path: String,
}

impl Appe {
    pub fn new(path: String) -> Self {
        Appe { path }
    }
}

#[async_trait]
impl CommandHandler for Appe {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let resolved = match support::resolve(&args, &self.path).await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        let (offset, ownership) = {
            let mut session = args.session.lock().await;
            let offset = std::mem::take(&mut session.start_pos);
            let ownership = session.user.as_ref().and_then(|u| u.ownership_override);
            (offset, ownership)
        };

        // A REST offset overrides append positioning, mirroring STOR restart.
        let file = if offset > 0 {
            let mut file = match tokio::fs::OpenOptions::new().write(true).create(true).open(&resolved.host).await {
                Ok(file) => file,
                Err(_) => return Ok(Reply::new(ReplyCode::FileError, "Could not open file")),
            };
            if file.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
                return Ok(Reply::new(ReplyCode::FileError, "Could not seek to restart offset"));
            }
            file
        } else {
            match tokio::fs::OpenOptions::new().append(true).create(true).open(&resolved.host).await {
                Ok(file) => file,
                Err(_) => return Ok(Reply::new(ReplyCode::FileError, "Could not open file")),
            }
        };

        support::begin_transfer(
            &args,
            TransferJob::Receive {
                file,
                host_path: resolved.host,
                ownership,
            },
            "Opening data connection",
        )
        .await
    }
}

//! The RFC 959 Store (`STOR`) command

use super::support;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;
use tokio::io::AsyncSeekExt;

#[derive(Debug)]
pub struct Stor {
    path: String,
}

impl Stor {
    pub fn new(path: String) -> Self {
        Stor { path }
    }
}

#[async_trait]
impl CommandHandler for Stor {
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

        let mut open_options = tokio::fs::OpenOptions::new();
        open_options.write(true).create(true);
        if offset == 0 {
            open_options.truncate(true);
        }
        let mut file = match open_options.open(&resolved.host).await {
            Ok(file) => file,
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "Could not create file")),
        };
        if offset > 0 {
            // Restarted upload: everything from the offset on is rewritten.
            if file.set_len(offset).await.is_err() || file.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
                return Ok(Reply::new(ReplyCode::FileError, "Could not seek to restart offset"));
            }
        }

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

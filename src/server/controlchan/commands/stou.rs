//! The RFC 959 Store Unique (`STOU`) command.
//
// The file lands in the current directory under a synthesized name that is
// announced in the opening reply.

use super::support;
use crate::server::{controlchan::{
    error::ControlChanError,
    handler::{CommandContext, CommandHandler},
    Reply, ReplyCode,
}, datachan::TransferJob};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Stou;

#[async_trait]
impl CommandHandler for Stou {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        if let Some(reply) = support::deny_read_only(&args).await {
            return Ok(reply);
        }
        let resolved = match support::resolve(&args, ".").await {
            Ok(resolved) => resolved,
            Err(reply) => return Ok(reply),
        };
        let ownership = {
            let session = args.session.lock().await;
            session.user.as_ref().and_then(|u| u.ownership_override)
        };

        let (name, file) = match crate::fs::create_unique(&resolved.host).await {
            Ok(Some(unique)) => unique,
            Ok(None) => {
                return Ok(Reply::new(
                    ReplyCode::TransientFileError,
                    "Could not construct a unique file name",
                ))
            }
            Err(_) => return Ok(Reply::new(ReplyCode::FileError, "Could not create file")),
        };

        let started = format!("FILE: {}", name);
        support::begin_transfer(
            &args,
            TransferJob::Receive {
                file,
                host_path: resolved.host.join(&name),
                ownership,
            },
            &started,
        )
        .await
    }
}

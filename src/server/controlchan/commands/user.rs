//! The RFC 959 User Name (`USER`) command

use crate::server::{
    controlchan::{
        error::ControlChanError,
        handler::{CommandContext, CommandHandler},
        Reply, ReplyCode,
    },
    session::SessionState,
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct User {
    username: String,
}

impl User {
    pub fn new(username: String) -> Self {
        User { username }
    }
}

#[async_trait]
impl CommandHandler for User {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let mut session = args.session.lock().await;
        // A USER in the authenticated state starts a re-login; the previous
        // identity stops counting immediately.
        if session.state == SessionState::Authenticated {
            session.user = None;
            session.resolver = None;
            session.cwd = "/".into();
        }
        session.state = SessionState::AwaitPass;
        session.pending_user = Some(self.username.clone());
        Ok(Reply::new(ReplyCode::NeedPassword, "Password required"))
    }
}

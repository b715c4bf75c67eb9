//! The RFC 959 Password (`PASS`) command
//
// Since password information is quite sensitive it never reaches the logs;
// see the Password wrapper's Debug impl.

use crate::{
    auth::Verdict,
    fs::PathResolver,
    server::{
        chancomms::{AuthOutcome, ControlChanMsg},
        controlchan::{
            error::ControlChanError,
            handler::{CommandContext, CommandHandler},
            Reply, ReplyCode,
        },
        password::Password,
        session::SessionState,
    },
};
use async_trait::async_trait;

#[derive(Debug)]
pub struct Pass {
    password: Password,
}

impl Pass {
    pub fn new(password: Password) -> Self {
        Pass { password }
    }
}

#[async_trait]
impl CommandHandler for Pass {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError> {
        let session = args.session.lock().await;
        if session.state != SessionState::AwaitPass {
            return Ok(Reply::new(ReplyCode::BadCommandSequence, "Please supply a username first"));
        }
        let username = match session.pending_user.clone() {
            Some(username) => username,
            None => {
                slog::error!(args.logger, "AwaitPass state without a pending username");
                return Ok(Reply::new(ReplyCode::NotLoggedIn, "Please open a new connection to re-authenticate"));
            }
        };
        let peer_ip = session.source.ip();
        drop(session);

        let password = match self.password.as_str() {
            Ok(password) => password.to_string(),
            Err(_) => return Ok(Reply::new(ReplyCode::ParameterSyntaxError, "Invalid UTF-8 in password")),
        };

        // Verification (possibly a blocking PAM conversation on the blocking
        // pool) runs off the control-reading path; the loop keeps serving and
        // replies when the outcome message arrives.
        let gate = args.auth_gate.clone();
        let tx = args.tx_control_chan.clone();
        let logger = args.logger.clone();
        tokio::spawn(async move {
            let outcome = match gate.verify(&username, &password, peer_ip).await {
                Verdict::Success(user) => match PathResolver::new(user.home.clone()).await {
                    Ok(resolver) => AuthOutcome::Granted { user, resolver },
                    Err(err) => {
                        slog::error!(logger, "Home directory of {} is unusable: {}", username, err);
                        AuthOutcome::Denied
                    }
                },
                Verdict::Rejected { close_session: false } => AuthOutcome::Denied,
                Verdict::Rejected { close_session: true } | Verdict::Blocked => AuthOutcome::DeniedAndClose,
            };
            if let Err(err) = tx.send(ControlChanMsg::AuthOutcome(outcome)).await {
                slog::warn!(logger, "Session ended before the auth outcome could be delivered: {}", err);
            }
        });

        Ok(Reply::none())
    }
}

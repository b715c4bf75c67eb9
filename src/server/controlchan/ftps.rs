use crate::server::{
    controlchan::{error::ControlChanError, middleware::ControlChanMiddleware, Command, Event, Reply, ReplyCode},
    session::SharedSession,
};

use async_trait::async_trait;

// When the server is configured to force TLS, USER and PASS on a plaintext
// control channel are refused until AUTH TLS has happened.
pub struct FtpsEnforcerMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    pub session: SharedSession,
    pub force_tls: bool,
    pub next: Next,
}

#[async_trait]
impl<Next> ControlChanMiddleware for FtpsEnforcerMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    async fn handle(&mut self, event: Event) -> Result<Reply, ControlChanError> {
        match &event {
            Event::Command(Command::User { .. }) | Event::Command(Command::Pass { .. }) if self.force_tls => {
                let tls_active = {
                    let session = self.session.lock().await;
                    session.cmd_tls
                };
                if tls_active {
                    self.next.handle(event).await
                } else {
                    Ok(Reply::new(
                        ReplyCode::NotLoggedIn,
                        "TLS is required on the control channel; send AUTH TLS first",
                    ))
                }
            }
            _ => self.next.handle(event).await,
        }
    }
}

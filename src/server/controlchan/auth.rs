use crate::server::{
    controlchan::{error::ControlChanError, middleware::ControlChanMiddleware, Command, Event, Reply, ReplyCode},
    session::{SessionState, SharedSession},
};

use async_trait::async_trait;

// AuthMiddleware ensures the user is authenticated before they can do much
// else. Only the session-level commands pass through unauthenticated.
pub struct AuthMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    pub session: SharedSession,
    pub next: Next,
}

#[async_trait]
impl<Next> ControlChanMiddleware for AuthMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    async fn handle(&mut self, event: Event) -> Result<Reply, ControlChanError> {
        match event {
            // Internal messages and the commands below are exempt from auth checks.
            Event::InternalMsg(_)
            | Event::Command(Command::Help)
            | Event::Command(Command::User { .. })
            | Event::Command(Command::Pass { .. })
            | Event::Command(Command::Auth { .. })
            | Event::Command(Command::Pbsz { .. })
            | Event::Command(Command::Prot { .. })
            | Event::Command(Command::Feat)
            | Event::Command(Command::Noop)
            | Event::Command(Command::Syst)
            | Event::Command(Command::Quit) => self.next.handle(event).await,
            _ => {
                let authenticated = {
                    let session = self.session.lock().await;
                    session.state == SessionState::Authenticated
                };
                if authenticated {
                    self.next.handle(event).await
                } else {
                    Ok(Reply::new(ReplyCode::NotLoggedIn, "Please authenticate"))
                }
            }
        }
    }
}

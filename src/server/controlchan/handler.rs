use crate::{
    auth::AuthGate,
    server::{
        chancomms::ControlChanMsg,
        controlchan::{command::Command, error::ControlChanError, Reply},
        port_alloc::PortAllocator,
        session::SharedSession,
    },
};
use async_trait::async_trait;
use std::{net::Ipv4Addr, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc::Sender;

// Common interface for all handlers of `Command`s
#[async_trait]
pub trait CommandHandler: Send + Sync + std::fmt::Debug {
    async fn handle(&self, args: CommandContext) -> Result<Reply, ControlChanError>;
}

/// Everything a command handler may need: the session, the shared services
/// and the channel back to the control loop.
#[derive(Debug)]
pub struct CommandContext {
    pub parsed_command: Command,
    pub session: SharedSession,
    pub auth_gate: Arc<AuthGate>,
    pub port_allocator: Arc<PortAllocator>,
    pub tls_configured: bool,
    /// Address advertised in PASV replies when the server sits behind NAT.
    pub passive_host: Option<Ipv4Addr>,
    /// How long to wait for the client on a passive data connection.
    pub accept_timeout: Duration,
    pub tx_control_chan: Sender<ControlChanMsg>,
    /// Local address of the control connection.
    pub local_addr: SocketAddr,
    pub logger: slog::Logger,
}

impl CommandContext {
    /// Queue an internal message without risking a deadlock with the control
    /// loop that is currently waiting on this very handler.
    pub fn notify(&self, msg: ControlChanMsg) {
        let tx = self.tx_control_chan.clone();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            if let Err(err) = tx.send(msg).await {
                slog::warn!(logger, "Could not send internal message: {}", err);
            }
        });
    }
}

use crate::{
    auth::AuthGate,
    metrics::MetricsMiddleware,
    server::{
        chancomms::{AuthOutcome, ControlChanMsg, TransferError},
        controlchan::{
            auth::AuthMiddleware,
            codec::FtpCodec,
            command::Command,
            commands,
            error::{ControlChanError, ControlChanErrorKind},
            ftps::FtpsEnforcerMiddleware,
            handler::{CommandContext, CommandHandler},
            log::LoggingMiddleware,
            middleware::ControlChanMiddleware,
            Event, Reply, ReplyCode,
        },
        listener::SessionTickets,
        port_alloc::PortAllocator,
        session::{Session, SessionState, SharedSession},
        shutdown,
        tls::FtpsConfig,
    },
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::{
        mpsc::{channel, Receiver, Sender},
        Mutex,
    },
};
use tokio_util::codec::Decoder;

trait AsyncReadAsyncWriteSendUnpin: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncReadAsyncWriteSendUnpin for T {}

// Per-session capacity for worker/handler messages back to the control loop.
const CONTROL_MSG_CHANNEL_SIZE: usize = 16;

/// Everything the control loop needs to serve one session.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub greeting: String,
    pub auth_gate: Arc<AuthGate>,
    pub port_allocator: Arc<PortAllocator>,
    pub passive_host: Option<Ipv4Addr>,
    pub accept_timeout: Duration,
    pub idle_timeout: Duration,
    pub ftps_config: FtpsConfig,
    pub force_tls: bool,
    pub logger: slog::Logger,
}

/// Does the TCP processing when an FTP client connects: greets, then spawns
/// the control channel event loop for the life of the session.
pub async fn spawn_loop(
    config: LoopConfig,
    tcp_stream: TcpStream,
    mut shutdown: shutdown::Listener,
    tickets: SessionTickets,
) -> Result<(), ControlChanError> {
    let LoopConfig {
        greeting,
        auth_gate,
        port_allocator,
        passive_host,
        accept_timeout,
        idle_timeout,
        ftps_config,
        force_tls,
        logger,
    } = config;

    let source = tcp_stream.peer_addr()?;
    let local_addr = tcp_stream.local_addr()?;
    let (control_msg_tx, mut control_msg_rx): (Sender<ControlChanMsg>, Receiver<ControlChanMsg>) =
        channel(CONTROL_MSG_CHANNEL_SIZE);

    let session = Session::new(source, ftps_config.clone());
    let logger = logger.new(slog::o!("trace-id" => format!("{}", session.trace_id), "source" => format!("{}", source)));
    let shared_session: SharedSession = Arc::new(Mutex::new(session));

    let event_chain = PrimaryEventHandler {
        logger: logger.clone(),
        session: shared_session.clone(),
        auth_gate,
        port_allocator,
        tls_configured: ftps_config.is_enabled(),
        passive_host,
        accept_timeout,
        tx_control_chan: control_msg_tx,
        local_addr,
    };
    let event_chain = AuthMiddleware {
        session: shared_session.clone(),
        next: event_chain,
    };
    let event_chain = FtpsEnforcerMiddleware {
        session: shared_session.clone(),
        force_tls,
        next: event_chain,
    };
    let event_chain = LoggingMiddleware {
        logger: logger.clone(),
        sequence_nr: 0,
        next: event_chain,
    };
    let mut event_chain = MetricsMiddleware { next: event_chain };

    let codec = FtpCodec::new();
    let io: Box<dyn AsyncReadAsyncWriteSendUnpin> = Box::new(tcp_stream);
    let (mut reply_sink, mut command_source) = codec.framed(io).split();

    reply_sink
        .send(Reply::new_with_string(ReplyCode::ServiceReady, greeting))
        .await?;
    reply_sink.flush().await?;

    tokio::spawn(async move {
        // Session-slot and per-IP tickets live exactly as long as this task.
        let _tickets = tickets;
        slog::info!(logger, "Starting control loop");
        loop {
            let incoming = {
                let mut timeout_delay = Box::pin(tokio::time::sleep(idle_timeout));
                tokio::select! {
                    // Internal messages first: a pending TLS upgrade must win
                    // over whatever the client already pipelined after it.
                    biased;
                    Some(msg) = control_msg_rx.recv() => {
                        Some(Ok(Event::InternalMsg(msg)))
                    },
                    next = command_source.next() => match next {
                        Some(cmd_result) => Some(cmd_result.map(Event::Command)),
                        None => {
                            slog::info!(logger, "Client closed the control connection");
                            break;
                        }
                    },
                    _ = &mut timeout_delay => {
                        // A long transfer is not idleness.
                        let busy = shared_session.lock().await.data_busy();
                        if busy {
                            None
                        } else {
                            Some(Err(ControlChanError::new(ControlChanErrorKind::ControlChannelTimeout)))
                        }
                    },
                    _ = shutdown.listen() => {
                        slog::info!(logger, "Shutting down control loop");
                        let _ = reply_sink.send(Reply::new(ReplyCode::ServiceNotAvailable, "Service shutting down")).await;
                        break;
                    }
                }
            };
            match incoming {
                None => {}
                Some(Ok(Event::InternalMsg(ControlChanMsg::ExitControlLoop))) => {
                    slog::info!(logger, "Exiting control loop");
                    break;
                }
                Some(Ok(Event::InternalMsg(ControlChanMsg::SecureControlChannel))) => {
                    slog::info!(logger, "Upgrading control channel to TLS");

                    // Get the original stream back from the codec halves. The
                    // upgrade happens between complete command lines, so
                    // nothing is lost by re-framing.
                    let codec_io = match reply_sink.reunite(command_source) {
                        Ok(framed) => framed,
                        Err(_) => {
                            slog::error!(logger, "Could not reunite control channel halves");
                            break;
                        }
                    };
                    let io = codec_io.into_inner();
                    let acceptor = match ftps_config.acceptor() {
                        Some(acceptor) => acceptor,
                        None => {
                            slog::error!(logger, "TLS upgrade requested while TLS is not configured");
                            break;
                        }
                    };
                    let io: Box<dyn AsyncReadAsyncWriteSendUnpin> = match acceptor.accept(io).await {
                        Ok(stream) => Box::new(stream),
                        Err(err) => {
                            slog::warn!(logger, "Closing control channel; TLS handshake failed: {}", err);
                            break;
                        }
                    };
                    shared_session.lock().await.cmd_tls = true;

                    let (sink, source) = FtpCodec::new().framed(io).split();
                    reply_sink = sink;
                    command_source = source;
                }
                Some(Ok(event)) => match event_chain.handle(event).await {
                    Ok(reply) => {
                        if reply_sink.send(reply).await.is_err() {
                            slog::warn!(logger, "Could not send reply to client");
                            break;
                        }
                    }
                    Err(err) => {
                        slog::warn!(logger, "Event handler chain error: {:?}; closing control connection", err);
                        break;
                    }
                },
                Some(Err(err)) => {
                    let (reply, close_connection) = handle_control_channel_error(&logger, err);
                    if reply_sink.send(reply).await.is_err() {
                        slog::warn!(logger, "Could not send error reply to client");
                        break;
                    }
                    if close_connection {
                        break;
                    }
                }
            }
        }
        // Teardown: a running worker must unwind within its bounded window;
        // everything else is released when the session drops right here.
        shared_session.lock().await.cancel_transfer();
        slog::info!(logger, "Control loop ended");
    });

    Ok(())
}

// Picks the reply for a control channel error and tells whether the
// connection should be closed afterwards.
fn handle_control_channel_error(logger: &slog::Logger, error: ControlChanError) -> (Reply, bool) {
    slog::warn!(logger, "Control channel error: {}", error);
    match error.kind() {
        ControlChanErrorKind::UnknownCommand { .. } => (Reply::new(ReplyCode::CommandSyntaxError, "Command not implemented"), false),
        ControlChanErrorKind::InvalidCommand => (Reply::new(ReplyCode::ParameterSyntaxError, "Invalid parameter"), false),
        ControlChanErrorKind::Utf8 => (Reply::new(ReplyCode::CommandSyntaxError, "Invalid UTF-8 in command"), true),
        ControlChanErrorKind::CommandLineTooLong => (Reply::new(ReplyCode::CommandSyntaxError, "Command line too long"), true),
        ControlChanErrorKind::ControlChannelTimeout => (
            Reply::new(ReplyCode::ServiceNotAvailable, "Session timed out; closing control connection"),
            true,
        ),
        _ => (Reply::new(ReplyCode::ServiceNotAvailable, "Internal server error"), true),
    }
}

#[derive(Debug)]
struct PrimaryEventHandler {
    logger: slog::Logger,
    session: SharedSession,
    auth_gate: Arc<AuthGate>,
    port_allocator: Arc<PortAllocator>,
    tls_configured: bool,
    passive_host: Option<Ipv4Addr>,
    accept_timeout: Duration,
    tx_control_chan: Sender<ControlChanMsg>,
    local_addr: SocketAddr,
}

impl PrimaryEventHandler {
    fn notify(&self, msg: ControlChanMsg) {
        let tx = self.tx_control_chan.clone();
        let logger = self.logger.clone();
        tokio::spawn(async move {
            if let Err(err) = tx.send(msg).await {
                slog::warn!(logger, "Could not send internal message: {}", err);
            }
        });
    }

    async fn handle_internal_msg(&self, msg: ControlChanMsg) -> Result<Reply, ControlChanError> {
        match msg {
            ControlChanMsg::SentData { bytes } => {
                self.finish_transfer().await;
                crate::metrics::add_bytes_sent(bytes);
                Ok(Reply::new(ReplyCode::ClosingDataConnection, "Transfer complete"))
            }
            ControlChanMsg::ReceivedData { bytes } => {
                self.finish_transfer().await;
                crate::metrics::add_bytes_received(bytes);
                Ok(Reply::new(ReplyCode::ClosingDataConnection, "Transfer complete"))
            }
            ControlChanMsg::ListingSent => {
                self.finish_transfer().await;
                Ok(Reply::new(ReplyCode::ClosingDataConnection, "Directory send OK"))
            }
            ControlChanMsg::TransferAborted => {
                self.finish_transfer().await;
                // The 226 ABOR acknowledgment must follow the 426.
                self.notify(ControlChanMsg::AbortAcknowledged);
                Ok(Reply::new(ReplyCode::ConnectionClosed, "Transfer aborted"))
            }
            ControlChanMsg::AbortAcknowledged => Ok(Reply::new(ReplyCode::ClosingDataConnection, "ABOR command successful")),
            ControlChanMsg::TransferFailed(err) => {
                self.finish_transfer().await;
                slog::warn!(self.logger, "Transfer failed: {}", err);
                Ok(match err {
                    TransferError::File(_) => Reply::new(ReplyCode::FileError, "File unavailable"),
                    TransferError::Local(_) => Reply::new(ReplyCode::LocalError, "Local error in processing"),
                    TransferError::DataConnection(_) => {
                        Reply::new(ReplyCode::ConnectionClosed, "Data connection error; transfer aborted")
                    }
                })
            }
            ControlChanMsg::AuthOutcome(outcome) => {
                let mut session = self.session.lock().await;
                match outcome {
                    AuthOutcome::Granted { user, resolver } => {
                        slog::info!(self.logger, "User {} logged in", user);
                        session.state = SessionState::Authenticated;
                        session.user = Some(user);
                        session.resolver = Some(resolver);
                        session.cwd = "/".into();
                        session.pending_user = None;
                        Ok(Reply::new(ReplyCode::UserLoggedIn, "User logged in, proceed"))
                    }
                    AuthOutcome::Denied => {
                        session.state = SessionState::AwaitUser;
                        session.pending_user = None;
                        Ok(Reply::new(ReplyCode::NotLoggedIn, "Authentication failed"))
                    }
                    AuthOutcome::DeniedAndClose => {
                        session.state = SessionState::AwaitUser;
                        session.pending_user = None;
                        drop(session);
                        self.notify(ControlChanMsg::ExitControlLoop);
                        Ok(Reply::new(ReplyCode::NotLoggedIn, "Authentication failed; too many attempts"))
                    }
                }
            }
            // Handled by the loop itself before the chain runs.
            ControlChanMsg::SecureControlChannel | ControlChanMsg::ExitControlLoop => Ok(Reply::none()),
        }
    }

    async fn finish_transfer(&self) {
        let mut session = self.session.lock().await;
        session.transfer = None;
        session.start_pos = 0;
    }

    async fn handle_command(&self, cmd: Command) -> Result<Reply, ControlChanError> {
        {
            let mut session = self.session.lock().await;
            if session.data_busy() && cmd.touches_data_channel() {
                return Ok(Reply::new(ReplyCode::CantOpenDataConnection, "Transfer already in progress"));
            }
            // RNFR is armed for exactly one RNTO, and REST for exactly one
            // transfer; any unrelated command in between disarms them.
            if !matches!(cmd, Command::Rnto { .. }) {
                session.rename_from = None;
            }
            if !cmd.touches_data_channel() {
                session.start_pos = 0;
            }
        }

        let args = CommandContext {
            parsed_command: cmd.clone(),
            session: self.session.clone(),
            auth_gate: self.auth_gate.clone(),
            port_allocator: self.port_allocator.clone(),
            tls_configured: self.tls_configured,
            passive_host: self.passive_host,
            accept_timeout: self.accept_timeout,
            tx_control_chan: self.tx_control_chan.clone(),
            local_addr: self.local_addr,
            logger: self.logger.clone(),
        };

        let handler: Box<dyn CommandHandler> = match cmd {
            Command::User { username } => Box::new(commands::User::new(username)),
            Command::Pass { password } => Box::new(commands::Pass::new(password)),
            Command::Auth { protocol } => Box::new(commands::Auth::new(protocol)),
            Command::Pbsz { .. } => Box::new(commands::Pbsz),
            Command::Prot { param } => Box::new(commands::Prot::new(param)),
            Command::Syst => Box::new(commands::Syst),
            Command::Feat => Box::new(commands::Feat),
            Command::Help => Box::new(commands::Help),
            Command::Noop => Box::new(commands::Noop),
            Command::Quit => Box::new(commands::Quit),
            Command::Allo => Box::new(commands::Allo),
            Command::Pwd => Box::new(commands::Pwd),
            Command::Cwd { path } => Box::new(commands::Cwd::new(path)),
            Command::Cdup => Box::new(commands::Cdup),
            Command::Type { param } => Box::new(commands::Type::new(param)),
            Command::Stru { param } => Box::new(commands::Stru::new(param)),
            Command::Mode { param } => Box::new(commands::Mode::new(param)),
            Command::Opts { option } => Box::new(commands::Opts::new(option)),
            Command::Dele { path } => Box::new(commands::Dele::new(path)),
            Command::Rmd { path } => Box::new(commands::Rmd::new(path)),
            Command::Mkd { path } => Box::new(commands::Mkd::new(path)),
            Command::Rnfr { path } => Box::new(commands::Rnfr::new(path)),
            Command::Rnto { path } => Box::new(commands::Rnto::new(path)),
            Command::Size { path } => Box::new(commands::Size::new(path)),
            Command::Mdtm { path } => Box::new(commands::Mdtm::new(path)),
            Command::Rest { offset } => Box::new(commands::Rest::new(offset)),
            Command::Pasv => Box::new(commands::Pasv),
            Command::Epsv => Box::new(commands::Epsv),
            Command::Port { peer } => Box::new(commands::Port::new(peer)),
            Command::Eprt { peer } => Box::new(commands::Eprt::new(peer)),
            Command::Retr { path } => Box::new(commands::Retr::new(path)),
            Command::Stor { path } => Box::new(commands::Stor::new(path)),
            Command::Appe { path } => Box::new(commands::Appe::new(path)),
            Command::Stou => Box::new(commands::Stou),
            Command::List { flags, path } => Box::new(commands::List::new(flags, path)),
            Command::Nlst { path } => Box::new(commands::Nlst::new(path)),
            Command::Mlsd { path } => Box::new(commands::Mlsd::new(path)),
            Command::Abor => Box::new(commands::Abor),
            Command::Stat { path } => Box::new(commands::Stat::new(path)),
        };

        handler.handle(args).await
    }
}

#[async_trait]
impl ControlChanMiddleware for PrimaryEventHandler {
    async fn handle(&mut self, event: Event) -> Result<Reply, ControlChanError> {
        match event {
            Event::Command(cmd) => self.handle_command(cmd).await,
            Event::InternalMsg(msg) => self.handle_internal_msg(msg).await,
        }
    }
}

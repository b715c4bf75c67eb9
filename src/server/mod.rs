//! Contains the [`Server`] that is used to configure and run a FTP server
//! instance, plus the internals it is assembled from.

pub(crate) mod chancomms;
pub(crate) mod controlchan;
pub(crate) mod datachan;
pub(crate) mod failed_logins;
pub(crate) mod listener;
pub(crate) mod password;
pub(crate) mod port_alloc;
pub(crate) mod session;
pub(crate) mod shutdown;
pub(crate) mod tls;

use crate::{
    auth::{AuthGate, Authenticator, LocalAuthenticator},
    options::{AuthBackend, Config},
    server::{
        controlchan::LoopConfig, failed_logins::FailedLogins, listener::Listener, port_alloc::PortAllocator,
        tls::FtpsConfig,
    },
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Fatal startup failures. Anything that happens after a successful start is
/// handled per session and never surfaces here.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A control socket could not be bound.
    #[error("could not bind control socket: {0}")]
    Bind(#[source] std::io::Error),
    /// The TLS certificate or key could not be loaded.
    #[error("could not load TLS certificate or key: {0}")]
    Tls(#[source] std::io::Error),
    /// The configuration is unusable.
    #[error("bad configuration: {0}")]
    BadConfig(String),
}

/// An instance of a FTP(S) server, built from a [`Config`] and run with
/// [`listen`](Server::listen).
///
/// # Example
///
/// ```no_run
/// use featherftp::{options::Config, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let server = Server::new(Config::default());
///     if let Err(err) = server.listen().await {
///         eprintln!("server failed to start: {}", err);
///     }
/// }
/// ```
pub struct Server {
    config: Config,
    logger: slog::Logger,
}

impl Server {
    /// Create a server from its configuration. Logging is discarded unless a
    /// logger is supplied with [`logger`](Server::logger).
    pub fn new(config: Config) -> Self {
        Server {
            config,
            logger: slog::Logger::root(slog::Discard, slog::o!()),
        }
    }

    /// Set the root logger; sessions get child loggers carrying a trace id
    /// and the peer address.
    pub fn logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Run the server until the process ends.
    pub async fn listen(self) -> Result<(), ServerError> {
        self.listen_until(std::future::pending::<()>()).await
    }

    /// Run the server until `signal` resolves, then stop accepting, tell
    /// every session to wind down and wait for them to finish.
    pub async fn listen_until<S>(self, signal: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let Server { config, logger } = self;

        let ftps_config = match &config.tls {
            Some(tls_options) => FtpsConfig::On {
                tls_config: tls::new_config(&tls_options.cert_path, &tls_options.key_path).map_err(ServerError::Tls)?,
            },
            None => FtpsConfig::Off,
        };
        if config.force_tls && !ftps_config.is_enabled() {
            return Err(ServerError::BadConfig("force_tls requires tls cert and key paths".to_string()));
        }
        if config.passive_ports.is_empty() {
            return Err(ServerError::BadConfig("passive port range is empty".to_string()));
        }

        let authenticator: Arc<dyn Authenticator> = match &config.auth {
            AuthBackend::Local => Arc::new(LocalAuthenticator::new(&config.users)),
            #[cfg(all(unix, feature = "pam_auth"))]
            AuthBackend::Pam { service } => Arc::new(crate::auth::PamAuthenticator::new(service.clone(), &config.users)),
            #[cfg(not(all(unix, feature = "pam_auth")))]
            AuthBackend::Pam { .. } => {
                return Err(ServerError::BadConfig(
                    "PAM support is not compiled in (enable the pam_auth feature)".to_string(),
                ))
            }
        };

        let failed_logins = Arc::new(FailedLogins::new(config.bruteforce_threshold, config.bruteforce_cooldown()));
        let auth_gate = Arc::new(AuthGate::new(authenticator, Arc::clone(&failed_logins)));
        let port_allocator = PortAllocator::new(config.passive_ports.clone());
        let shutdown_topic = Arc::new(shutdown::Notifier::new());

        {
            let failed_logins = Arc::clone(&failed_logins);
            let sweeper_logger = logger.new(slog::o!("task" => "failed-logins-sweeper"));
            let sweeper_shutdown = shutdown_topic.subscribe();
            tokio::spawn(async move {
                failed_logins.sweeper(sweeper_logger, sweeper_shutdown).await;
            });
        }

        let loop_config = LoopConfig {
            greeting: config.greeting.clone(),
            auth_gate,
            port_allocator,
            passive_host: config.nat_ip,
            accept_timeout: config.accept_timeout(),
            idle_timeout: config.idle_timeout(),
            ftps_config,
            force_tls: config.force_tls,
            logger: logger.clone(),
        };

        let listener = Listener {
            bind_address: config.bind_addr,
            bind_address_v6: config.bind_addr_v6,
            logger: logger.clone(),
            loop_config,
            shutdown_topic: Arc::clone(&shutdown_topic),
            failed_logins,
            max_sessions: config.max_sessions,
            max_sessions_per_ip: config.max_sessions_per_ip,
        };

        tokio::select! {
            result = listener.listen() => result,
            _ = signal => {
                slog::info!(logger, "Shutdown signal received");
                shutdown_topic.notify();
                shutdown_topic.linger().await;
                Ok(())
            }
        }
    }
}

//! TLS support for the control and data channels: building the rustls server
//! configuration from the configured PEM files and handing out acceptors for
//! explicit upgrades.

use rustls::{internal::pemfile, Certificate, NoClientAuth, PrivateKey, ProtocolVersion, ServerConfig};
use std::fmt;
use std::fmt::Formatter;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// FtpsConfig tells how TLS security is configured for the server or a
// particular channel. The rustls configuration is built once at startup, so
// a failing certificate or key is a startup error, not a per-session one.
#[derive(Clone)]
pub enum FtpsConfig {
    Off,
    On { tls_config: Arc<ServerConfig> },
}

impl FtpsConfig {
    /// An acceptor for upgrading a stream, when TLS is configured.
    pub fn acceptor(&self) -> Option<tokio_rustls::TlsAcceptor> {
        match self {
            FtpsConfig::On { tls_config } => Some(tls_config.clone().into()),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, FtpsConfig::On { .. })
    }
}

impl fmt::Debug for FtpsConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FtpsConfig::Off => write!(f, "Off"),
            FtpsConfig::On { .. } => write!(f, "On"),
        }
    }
}

pub fn new_config<P: AsRef<Path>>(certs_file: P, key_file: P) -> std::io::Result<Arc<ServerConfig>> {
    let certs: Vec<Certificate> = load_certs(certs_file)?;
    let privkey: PrivateKey = load_private_key(key_file)?;

    let mut config = ServerConfig::new(NoClientAuth::new());
    // Session resumption with server side state (session IDs) so clients can
    // resume the control-channel session on their data channels.
    config.session_storage = TlsSessionCache::new(1024);
    // Don't allow dumping session keys
    config.key_log = Arc::new(rustls::NoKeyLog {});
    config
        .set_single_cert(certs, privkey)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    config.versions = vec![ProtocolVersion::TLSv1_2, ProtocolVersion::TLSv1_3];

    Ok(Arc::new(config))
}

fn load_certs<P: AsRef<Path>>(filename: P) -> std::io::Result<Vec<Certificate>> {
    let certfile: File = File::open(filename)?;
    let mut reader: BufReader<File> = BufReader::new(certfile);
    pemfile::certs(&mut reader).map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidData))
}

fn load_private_key<P: AsRef<Path>>(filename: P) -> std::io::Result<PrivateKey> {
    let rsa_keys = {
        let keyfile = File::open(&filename)?;
        let mut reader = BufReader::new(keyfile);
        pemfile::rsa_private_keys(&mut reader).map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidData))?
    };

    let pkcs8_keys = {
        let keyfile = File::open(&filename)?;
        let mut reader = BufReader::new(keyfile);
        pemfile::pkcs8_private_keys(&mut reader).map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidData))?
    };

    // prefer pkcs8 keys
    let key = if !pkcs8_keys.is_empty() {
        pkcs8_keys[0].clone()
    } else {
        if rsa_keys.is_empty() {
            return Err(std::io::Error::from(std::io::ErrorKind::InvalidData));
        }
        rsa_keys[0].clone()
    };

    Ok(key)
}

/// Stores TLS session IDs server side so data connections can resume the
/// control-channel session.
struct TlsSessionCache {
    cache: moka::sync::Cache<Vec<u8>, Vec<u8>>,
}

impl TlsSessionCache {
    pub fn new(size: usize) -> Arc<TlsSessionCache> {
        debug_assert!(size > 0);
        Arc::new(TlsSessionCache {
            cache: moka::sync::CacheBuilder::new(size).time_to_idle(Duration::from_secs(5 * 60)).build(),
        })
    }
}

impl rustls::StoresServerSessions for TlsSessionCache {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.cache.insert(key, value);
        true
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.cache.get(&key.to_vec())
    }

    fn take(&self, key: &[u8]) -> Option<Vec<u8>> {
        // Get instead of invalidate: clients like FileZilla resume the same
        // session ID on every data connection.
        self.cache.get(&key.to_vec())
    }
}

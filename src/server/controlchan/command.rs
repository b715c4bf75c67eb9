//! The parsed form of everything a client can say on the control channel.

use crate::server::password::Password;
use std::net::{SocketAddr, SocketAddrV4};

// The parameter that can be given to the AUTH command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AuthParam {
    Ssl,
    Tls,
}

// The parameter that can be given to the PROT command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ProtParam {
    // 'C' - no protection on the data channel
    Clear,
    // 'S' - integrity only (not supported)
    Safe,
    // 'E' - confidentiality only (not supported)
    Confidential,
    // 'P' - TLS on the data channel
    Private,
}

// The parameter that can be given to the TYPE command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TypeParam {
    Ascii,
    Binary,
    // Anything else RFC 959 allows; answered with 504.
    Other,
}

// The parameter that can be given to the OPTS command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Opt {
    Utf8 { on: bool },
    Other,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    User {
        /// The bytes making up the username.
        username: String,
    },
    Pass {
        /// The password, kept out of logs by its Debug impl.
        password: Password,
    },
    Auth {
        protocol: AuthParam,
    },
    Pbsz {
        size: u64,
    },
    Prot {
        param: ProtParam,
    },
    Syst,
    Feat,
    Help,
    Noop,
    Quit,
    Allo,
    Pwd,
    Cwd {
        /// The path the client wants to change to, as sent.
        path: String,
    },
    Cdup,
    Type {
        param: TypeParam,
    },
    Stru {
        param: char,
    },
    Mode {
        param: char,
    },
    Opts {
        option: Opt,
    },
    Dele {
        path: String,
    },
    Rmd {
        path: String,
    },
    Mkd {
        path: String,
    },
    Rnfr {
        path: String,
    },
    Rnto {
        path: String,
    },
    Size {
        path: String,
    },
    Mdtm {
        path: String,
    },
    Rest {
        offset: u64,
    },
    Pasv,
    Epsv,
    Port {
        peer: SocketAddrV4,
    },
    Eprt {
        peer: SocketAddr,
    },
    Retr {
        path: String,
    },
    Stor {
        path: String,
    },
    Appe {
        path: String,
    },
    Stou,
    List {
        /// `-a` style flags, verbatim.
        flags: String,
        path: Option<String>,
    },
    Nlst {
        path: Option<String>,
    },
    Mlsd {
        path: Option<String>,
    },
    Abor,
    Stat {
        path: Option<String>,
    },
}

impl Command {
    /// The canonical verb, e.g. for metrics labels.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::User { .. } => "USER",
            Command::Pass { .. } => "PASS",
            Command::Auth { .. } => "AUTH",
            Command::Pbsz { .. } => "PBSZ",
            Command::Prot { .. } => "PROT",
            Command::Syst => "SYST",
            Command::Feat => "FEAT",
            Command::Help => "HELP",
            Command::Noop => "NOOP",
            Command::Quit => "QUIT",
            Command::Allo => "ALLO",
            Command::Pwd => "PWD",
            Command::Cwd { .. } => "CWD",
            Command::Cdup => "CDUP",
            Command::Type { .. } => "TYPE",
            Command::Stru { .. } => "STRU",
            Command::Mode { .. } => "MODE",
            Command::Opts { .. } => "OPTS",
            Command::Dele { .. } => "DELE",
            Command::Rmd { .. } => "RMD",
            Command::Mkd { .. } => "MKD",
            Command::Rnfr { .. } => "RNFR",
            Command::Rnto { .. } => "RNTO",
            Command::Size { .. } => "SIZE",
            Command::Mdtm { .. } => "MDTM",
            Command::Rest { .. } => "REST",
            Command::Pasv => "PASV",
            Command::Epsv => "EPSV",
            Command::Port { .. } => "PORT",
            Command::Eprt { .. } => "EPRT",
            Command::Retr { .. } => "RETR",
            Command::Stor { .. } => "STOR",
            Command::Appe { .. } => "APPE",
            Command::Stou => "STOU",
            Command::List { .. } => "LIST",
            Command::Nlst { .. } => "NLST",
            Command::Mlsd { .. } => "MLSD",
            Command::Abor => "ABOR",
            Command::Stat { .. } => "STAT",
        }
    }

    /// Whether this command initiates a data transfer or (re)arranges the
    /// data connection. These are refused with 425 while a transfer runs.
    pub fn touches_data_channel(&self) -> bool {
        matches!(
            self,
            Command::Retr { .. }
                | Command::Stor { .. }
                | Command::Appe { .. }
                | Command::Stou
                | Command::List { .. }
                | Command::Nlst { .. }
                | Command::Mlsd { .. }
                | Command::Pasv
                | Command::Epsv
                | Command::Port { .. }
                | Command::Eprt { .. }
                | Command::Rest { .. }
        )
    }
}

//! Parses raw command lines into [`Command`]s. Verbs are case-insensitive,
//! arguments keep their case.

use super::command::{AuthParam, Command, Opt, ProtParam, TypeParam};
use crate::server::password::Password;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::str;
use thiserror::Error;

/// Why a line did not parse.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    /// The verb is not in our dispatch table.
    #[error("unknown command: {command}")]
    UnknownCommand { command: String },
    /// Known verb, bad arguments.
    #[error("invalid command parameter")]
    InvalidCommand,
    /// The line contained invalid UTF-8.
    #[error("invalid UTF-8 in command")]
    InvalidUtf8,
    /// The line did not end in (CR)LF.
    #[error("missing line terminator")]
    InvalidEol,
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse one raw line (terminator included) into a [`Command`].
#[tracing_attributes::instrument]
pub fn parse(line: &[u8]) -> Result<Command> {
    // Not every client sends the mandatory CR, so a bare LF is accepted too.
    let line = match line {
        [rest @ .., b'\r', b'\n'] => rest,
        [rest @ .., b'\n'] => rest,
        _ => return Err(ParseError::InvalidEol),
    };
    let (verb_bytes, arg_bytes) = match line.iter().position(|&b| b == b' ') {
        Some(idx) => (&line[..idx], &line[idx + 1..]),
        None => (line, &line[..0]),
    };
    if verb_bytes.is_empty() {
        return Err(ParseError::InvalidCommand);
    }
    let verb = str::from_utf8(verb_bytes)
        .map_err(|_| ParseError::InvalidUtf8)?
        .to_ascii_uppercase();
    let args = str::from_utf8(arg_bytes).map_err(|_| ParseError::InvalidUtf8)?;

    let command = match verb.as_str() {
        "USER" => Command::User {
            username: required(args)?,
        },
        "PASS" => Command::Pass {
            password: Password::from(args),
        },
        "AUTH" => match args.to_ascii_uppercase().as_str() {
            "TLS" => Command::Auth { protocol: AuthParam::Tls },
            "SSL" => Command::Auth { protocol: AuthParam::Ssl },
            _ => return Err(ParseError::InvalidCommand),
        },
        "PBSZ" => Command::Pbsz {
            size: args.trim().parse().map_err(|_| ParseError::InvalidCommand)?,
        },
        "PROT" => match args.to_ascii_uppercase().as_str() {
            "C" => Command::Prot { param: ProtParam::Clear },
            "S" => Command::Prot { param: ProtParam::Safe },
            "E" => Command::Prot {
                param: ProtParam::Confidential,
            },
            "P" => Command::Prot { param: ProtParam::Private },
            _ => return Err(ParseError::InvalidCommand),
        },
        "SYST" => no_args(args, Command::Syst)?,
        "FEAT" => no_args(args, Command::Feat)?,
        "HELP" => Command::Help,
        "NOOP" => no_args(args, Command::Noop)?,
        "QUIT" => Command::Quit,
        "ALLO" => Command::Allo,
        "PWD" | "XPWD" => no_args(args, Command::Pwd)?,
        "CWD" | "XCWD" => Command::Cwd { path: required(args)? },
        "CDUP" => no_args(args, Command::Cdup)?,
        "TYPE" => {
            let param = match args.trim().to_ascii_uppercase().as_str() {
                "A" | "A N" => TypeParam::Ascii,
                "I" | "L 8" => TypeParam::Binary,
                "" => return Err(ParseError::InvalidCommand),
                _ => TypeParam::Other,
            };
            Command::Type { param }
        }
        "STRU" => Command::Stru {
            param: single_char(args)?,
        },
        "MODE" => Command::Mode {
            param: single_char(args)?,
        },
        "OPTS" => {
            let mut tokens = args.split_whitespace();
            let option = match tokens.next().map(str::to_ascii_uppercase).as_deref() {
                Some("UTF8") => match tokens.next().map(str::to_ascii_uppercase).as_deref() {
                    Some("ON") | None => Opt::Utf8 { on: true },
                    Some("OFF") => Opt::Utf8 { on: false },
                    _ => return Err(ParseError::InvalidCommand),
                },
                Some(_) => Opt::Other,
                None => return Err(ParseError::InvalidCommand),
            };
            Command::Opts { option }
        }
        "DELE" => Command::Dele { path: required(args)? },
        "RMD" | "XRMD" => Command::Rmd { path: required(args)? },
        "MKD" | "XMKD" => Command::Mkd { path: required(args)? },
        "RNFR" => Command::Rnfr { path: required(args)? },
        "RNTO" => Command::Rnto { path: required(args)? },
        "SIZE" => Command::Size { path: required(args)? },
        "MDTM" => Command::Mdtm { path: required(args)? },
        "REST" => Command::Rest {
            offset: args.trim().parse().map_err(|_| ParseError::InvalidCommand)?,
        },
        "PASV" => no_args(args, Command::Pasv)?,
        "EPSV" => match args.trim().to_ascii_uppercase().as_str() {
            "" | "1" | "2" | "ALL" => Command::Epsv,
            _ => return Err(ParseError::InvalidCommand),
        },
        "PORT" => Command::Port { peer: parse_port(args)? },
        "EPRT" => Command::Eprt { peer: parse_eprt(args)? },
        "RETR" => Command::Retr { path: required(args)? },
        "STOR" => Command::Stor { path: required(args)? },
        "APPE" => Command::Appe { path: required(args)? },
        "STOU" => Command::Stou,
        "LIST" => {
            let mut flags: Vec<&str> = Vec::new();
            let mut paths: Vec<&str> = Vec::new();
            for token in args.split_whitespace() {
                if token.starts_with('-') {
                    flags.push(token);
                } else {
                    paths.push(token);
                }
            }
            Command::List {
                flags: flags.join(" "),
                path: if paths.is_empty() { None } else { Some(paths.join(" ")) },
            }
        }
        "NLST" => Command::Nlst { path: optional(args) },
        "MLSD" => Command::Mlsd { path: optional(args) },
        "ABOR" => Command::Abor,
        "STAT" => Command::Stat { path: optional(args) },
        _ => {
            return Err(ParseError::UnknownCommand { command: verb });
        }
    };
    Ok(command)
}

fn required(args: &str) -> Result<String> {
    if args.is_empty() {
        Err(ParseError::InvalidCommand)
    } else {
        Ok(args.to_string())
    }
}

fn optional(args: &str) -> Option<String> {
    if args.is_empty() {
        None
    } else {
        Some(args.to_string())
    }
}

fn no_args(args: &str, command: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::InvalidCommand)
    }
}

fn single_char(args: &str) -> Result<char> {
    let trimmed = args.trim();
    if trimmed.len() != 1 {
        return Err(ParseError::InvalidCommand);
    }
    Ok(trimmed.chars().next().unwrap().to_ascii_uppercase())
}

// PORT h1,h2,h3,h4,p1,p2
fn parse_port(args: &str) -> Result<SocketAddrV4> {
    let bytes: Vec<u8> = args
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| ParseError::InvalidCommand)?;
    if bytes.len() != 6 {
        return Err(ParseError::InvalidCommand);
    }
    let ip = std::net::Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    let port = u16::from(bytes[4]) * 256 + u16::from(bytes[5]);
    Ok(SocketAddrV4::new(ip, port))
}

// EPRT |1|132.235.1.2|6275| or |2|1080::8:800:200C:417A|5282|
fn parse_eprt(args: &str) -> Result<SocketAddr> {
    let delim = args.chars().next().ok_or(ParseError::InvalidCommand)?;
    let parts: Vec<&str> = args.split(delim).collect();
    if parts.len() != 5 || !parts[0].is_empty() || !parts[4].is_empty() {
        return Err(ParseError::InvalidCommand);
    }
    let ip: IpAddr = parts[2].parse().map_err(|_| ParseError::InvalidCommand)?;
    let port: u16 = parts[3].parse().map_err(|_| ParseError::InvalidCommand)?;
    match (parts[1], ip) {
        ("1", IpAddr::V4(_)) | ("2", IpAddr::V6(_)) => Ok(SocketAddr::new(ip, port)),
        _ => Err(ParseError::InvalidCommand),
    }
}

//! The control channel error type.

use super::parser::ParseError;
use std::fmt;
use thiserror::Error;

/// A list specifying categories of control channel errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlChanErrorKind {
    /// We encountered a system IO error.
    #[error("failed to perform IO")]
    Io,
    /// We encountered a non-UTF8 character in the command.
    #[error("non-UTF8 character in command")]
    Utf8,
    /// The client issued a command we don't know about.
    #[error("unknown command: {command}")]
    UnknownCommand {
        /// The verb we don't know about.
        command: String,
    },
    /// The client issued a known command in an invalid way.
    #[error("invalid command (invalid parameter)")]
    InvalidCommand,
    /// The command line exceeded the line-length cap.
    #[error("command line too long")]
    CommandLineTooLong,
    /// No command arrived within the idle interval.
    #[error("read timeout on the control channel")]
    ControlChannelTimeout,
    /// The control channel is out of sync, e.g. a reply sink vanished.
    #[error("internal server error")]
    InternalServerError,
}

/// The error type carried through the control loop and its middleware.
#[derive(Debug)]
pub struct ControlChanError {
    kind: ControlChanErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ControlChanError {
    pub fn new(kind: ControlChanErrorKind) -> Self {
        ControlChanError { kind, source: None }
    }

    pub fn kind(&self) -> &ControlChanErrorKind {
        &self.kind
    }
}

impl fmt::Display for ControlChanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for ControlChanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ControlChanErrorKind> for ControlChanError {
    fn from(kind: ControlChanErrorKind) -> ControlChanError {
        ControlChanError::new(kind)
    }
}

impl From<std::io::Error> for ControlChanError {
    fn from(err: std::io::Error) -> ControlChanError {
        ControlChanError {
            kind: ControlChanErrorKind::Io,
            source: Some(Box::new(err)),
        }
    }
}

impl From<std::str::Utf8Error> for ControlChanError {
    fn from(err: std::str::Utf8Error) -> ControlChanError {
        ControlChanError {
            kind: ControlChanErrorKind::Utf8,
            source: Some(Box::new(err)),
        }
    }
}

impl From<ParseError> for ControlChanError {
    fn from(err: ParseError) -> ControlChanError {
        let kind = match &err {
            ParseError::UnknownCommand { command } => ControlChanErrorKind::UnknownCommand {
                command: command.clone(),
            },
            ParseError::InvalidUtf8 => ControlChanErrorKind::Utf8,
            ParseError::InvalidEol | ParseError::InvalidCommand => ControlChanErrorKind::InvalidCommand,
        };
        ControlChanError {
            kind,
            source: Some(Box::new(err)),
        }
    }
}

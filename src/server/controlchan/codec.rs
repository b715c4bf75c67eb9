use super::{command::Command, error::{ControlChanError, ControlChanErrorKind}, parser, Reply};

use bytes::BytesMut;
use std::io::Write;
use tokio_util::codec::{Decoder, Encoder};

/// The hard cap on a command line, terminator included. A line of exactly
/// this length is still served; one byte more closes the session with a 500.
pub const MAX_LINE_LEN: usize = 4096;

// FtpCodec implements tokio's `Decoder` and `Encoder` traits for the control
// channel: lines in, replies out.
pub struct FtpCodec {
    // Index of the next byte to examine for a '\n', so decode() does not
    // rescan bytes it has already seen across partial reads.
    next_index: usize,
}

impl FtpCodec {
    pub fn new() -> Self {
        FtpCodec { next_index: 0 }
    }
}

impl Decoder for FtpCodec {
    type Item = Command;
    type Error = ControlChanError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Command>, Self::Error> {
        if let Some(newline_offset) = buf[self.next_index..].iter().position(|b| *b == b'\n') {
            let newline_index = newline_offset + self.next_index;
            if newline_index + 1 > MAX_LINE_LEN {
                return Err(ControlChanError::new(ControlChanErrorKind::CommandLineTooLong));
            }
            let line = buf.split_to(newline_index + 1);
            self.next_index = 0;
            Ok(Some(parser::parse(&line)?))
        } else if buf.len() >= MAX_LINE_LEN {
            // Whatever terminator may still arrive, this line is already over
            // the cap; cut the slowloris off now.
            Err(ControlChanError::new(ControlChanErrorKind::CommandLineTooLong))
        } else {
            self.next_index = buf.len();
            Ok(None)
        }
    }
}

impl Encoder<Reply> for FtpCodec {
    type Error = ControlChanError;

    fn encode(&mut self, reply: Reply, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let mut buffer = vec![];
        match reply {
            Reply::None => {
                return Ok(());
            }
            Reply::CodeAndMsg { code, msg } => {
                if msg.is_empty() {
                    writeln!(buffer, "{}\r", code as u32)?;
                } else {
                    writeln!(buffer, "{} {}\r", code as u32, msg)?;
                }
            }
            Reply::MultiLine { code, mut lines } => {
                let last_line = lines.pop().unwrap_or_default();
                // Lines starting with a digit must be indented per RFC 959.
                for line in lines.iter_mut() {
                    if line.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                        line.insert(0, ' ');
                    }
                }
                if lines.is_empty() {
                    writeln!(buffer, "{} {}\r", code as u32, last_line)?;
                } else {
                    write!(
                        buffer,
                        "{}-{}\r\n{} {}\r\n",
                        code as u32,
                        lines.join("\r\n"),
                        code as u32,
                        last_line
                    )?;
                }
            }
        }
        buf.extend(&buffer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::controlchan::ReplyCode;
    use pretty_assertions::assert_eq;

    fn decode_all(codec: &mut FtpCodec, bytes: &[u8]) -> Result<Option<Command>, ControlChanError> {
        let mut buf = BytesMut::from(bytes);
        codec.decode(&mut buf)
    }

    #[test]
    fn decodes_a_complete_line() {
        let mut codec = FtpCodec::new();
        let cmd = decode_all(&mut codec, b"NOOP\r\n").unwrap().unwrap();
        assert_eq!(cmd, Command::Noop);
    }

    #[test]
    fn waits_for_more_bytes() {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::from(&b"NO"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"OP\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), Command::Noop);
    }

    #[test]
    fn line_of_exactly_max_len_is_accepted() {
        let mut codec = FtpCodec::new();
        // "RETR <padding>\r\n" filling exactly MAX_LINE_LEN bytes.
        let mut line = b"RETR ".to_vec();
        line.extend(std::iter::repeat(b'x').take(MAX_LINE_LEN - line.len() - 2));
        line.extend_from_slice(b"\r\n");
        assert_eq!(line.len(), MAX_LINE_LEN);
        let cmd = decode_all(&mut codec, &line).unwrap().unwrap();
        assert!(matches!(cmd, Command::Retr { .. }));
    }

    #[test]
    fn line_one_byte_over_is_rejected() {
        let mut codec = FtpCodec::new();
        let mut line = b"RETR ".to_vec();
        line.extend(std::iter::repeat(b'x').take(MAX_LINE_LEN - line.len() - 1));
        line.extend_from_slice(b"\r\n");
        assert_eq!(line.len(), MAX_LINE_LEN + 1);
        let err = decode_all(&mut codec, &line).unwrap_err();
        assert_eq!(err.kind(), &ControlChanErrorKind::CommandLineTooLong);
    }

    #[test]
    fn terminatorless_flood_is_rejected() {
        let mut codec = FtpCodec::new();
        let line = vec![b'x'; MAX_LINE_LEN];
        let err = decode_all(&mut codec, &line).unwrap_err();
        assert_eq!(err.kind(), &ControlChanErrorKind::CommandLineTooLong);
    }

    fn encode(reply: Reply) -> String {
        let mut codec = FtpCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(reply, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn encodes_single_line_reply() {
        assert_eq!(encode(Reply::new(ReplyCode::CommandOkay, "Okay")), "200 Okay\r\n");
    }

    #[test]
    fn encodes_multiline_reply() {
        let reply = Reply::new_multiline(ReplyCode::SystemStatus, vec!["Extensions supported:", " SIZE", "END"]);
        assert_eq!(encode(reply), "211-Extensions supported:\r\n SIZE\r\n211 END\r\n");
    }

    #[test]
    fn encodes_nothing_for_none() {
        assert_eq!(encode(Reply::none()), "");
    }
}

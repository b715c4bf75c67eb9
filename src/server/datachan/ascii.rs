//! ASCII-mode line-ending translation, resilient to sequences that straddle
//! the transfer engine's chunk boundaries.
//!
//! Policy for the cases RFC 959 leaves open: outbound, a bare LF becomes
//! CRLF and existing CRLF pairs pass through untouched; inbound, CRLF
//! becomes LF while bare CR and bare LF are preserved as-is.

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Translates local text to NVT-ASCII (LF → CRLF) for downloads.
#[derive(Debug, Default)]
pub struct AsciiEncoder {
    last_was_cr: bool,
}

impl AsciiEncoder {
    pub fn new() -> Self {
        AsciiEncoder::default()
    }

    pub fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &b in input {
            if b == LF && !self.last_was_cr {
                out.push(CR);
            }
            out.push(b);
            self.last_was_cr = b == CR;
        }
    }
}

/// Translates NVT-ASCII to local text (CRLF → LF) for uploads.
#[derive(Debug, Default)]
pub struct AsciiDecoder {
    pending_cr: bool,
}

impl AsciiDecoder {
    pub fn new() -> Self {
        AsciiDecoder::default()
    }

    pub fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &b in input {
            if self.pending_cr {
                self.pending_cr = false;
                if b == LF {
                    out.push(LF);
                    continue;
                }
                out.push(CR);
                if b == CR {
                    self.pending_cr = true;
                    continue;
                }
                out.push(b);
            } else if b == CR {
                // Withheld until we see whether an LF follows.
                self.pending_cr = true;
            } else {
                out.push(b);
            }
        }
    }

    /// Flush at end of stream: a trailing CR was real data.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(CR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut enc = AsciiEncoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            enc.encode(chunk, &mut out);
        }
        out
    }

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut dec = AsciiDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            dec.decode(chunk, &mut out);
        }
        dec.finish(&mut out);
        out
    }

    #[test]
    fn encode_expands_bare_lf() {
        assert_eq!(encode_chunks(&[b"a\nb\n"]), b"a\r\nb\r\n");
    }

    #[test]
    fn encode_keeps_existing_crlf() {
        assert_eq!(encode_chunks(&[b"a\r\nb"]), b"a\r\nb");
    }

    #[test]
    fn encode_handles_crlf_across_chunks() {
        assert_eq!(encode_chunks(&[b"a\r", b"\nb"]), b"a\r\nb");
    }

    #[test]
    fn decode_collapses_crlf() {
        assert_eq!(decode_chunks(&[b"a\r\nb\r\n"]), b"a\nb\n");
    }

    #[test]
    fn decode_handles_crlf_across_chunks() {
        assert_eq!(decode_chunks(&[b"a\r", b"\nb"]), b"a\nb");
    }

    #[test]
    fn decode_preserves_bare_cr_and_lf() {
        assert_eq!(decode_chunks(&[b"a\rb\nc"]), b"a\rb\nc");
        assert_eq!(decode_chunks(&[b"a\r", b"b"]), b"a\rb");
    }

    #[test]
    fn decode_preserves_trailing_cr() {
        assert_eq!(decode_chunks(&[b"abc\r"]), b"abc\r");
    }

    #[test]
    fn decode_handles_cr_runs() {
        assert_eq!(decode_chunks(&[b"a\r\r\nb"]), b"a\r\nb");
    }
}

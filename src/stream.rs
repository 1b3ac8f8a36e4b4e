//! Line-oriented decoding and encoding streams
//!
//! [`LineReader`] decodes any [`BufRead`] into lines of UTF-8 text and
//! [`LineWriter`] encodes lines into any [`Write`]. Neither holds more than
//! one buffered chunk plus the current line.

use std::fmt;
use std::io::{self, BufRead, Write};

use encoding_rs::{
    CoderResult, Decoder, Encoder, EncoderResult, Encoding as Codec, UTF_8, UTF_16BE, UTF_16LE,
};

use crate::Bom;

/// Terminator written after every line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineEnding {
    /// `\r\n`
    CrLf,
    /// `\n`
    Lf,
}

impl LineEnding {
    /// `CrLf` on Windows, `Lf` elsewhere
    pub fn native() -> Self {
        if cfg!(windows) {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    /// The terminator text
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::CrLf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::native()
    }
}

/// What to do with characters the output encoding cannot represent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnmappablePolicy {
    /// Substitute `?`
    #[default]
    Replace,
    /// Substitute an HTML decimal character reference such as `&#26085;`
    NumericCharRef,
    /// Fail with an [`UnmappableError`]
    Strict,
}

/// A character had no representation in the output encoding.
///
/// Surfaced from [`LineWriter::write_line`] as the payload of an
/// [`io::Error`] of kind [`io::ErrorKind::InvalidData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmappableError {
    character: char,
    encoding: &'static str,
}

impl UnmappableError {
    /// The character that could not be encoded
    pub fn character(&self) -> char {
        self.character
    }

    /// Name of the output codec
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }
}

impl fmt::Display for UnmappableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot encode character '{}' (U+{:04X}) in {}",
            self.character, self.character as u32, self.encoding
        )
    }
}

impl std::error::Error for UnmappableError {}

fn buffer_overflow() -> io::Error {
    io::Error::new(io::ErrorKind::OutOfMemory, "conversion buffer size overflow")
}

/// Reads decoded lines from a byte stream.
///
/// A line ends at `\r\n`, `\n` or a lone `\r`; the terminator is not
/// returned. Malformed input is replaced with U+FFFD.
pub struct LineReader<R> {
    inner: R,
    decoder: Decoder,
    /// Decoded text; `pending[consumed..]` has not been returned yet
    pending: String,
    consumed: usize,
    /// `pending[..scanned]` holds no terminator past `consumed`, except
    /// possibly a `\r` at `scanned` itself
    scanned: usize,
    eof: bool,
    bytes_read: u64,
    malformed: bool,
}

impl<R: BufRead> LineReader<R> {
    /// Wrap `inner`, decoding with `decoder`
    pub fn new(inner: R, decoder: Decoder) -> Self {
        Self {
            inner,
            decoder,
            pending: String::new(),
            consumed: 0,
            scanned: 0,
            eof: false,
            bytes_read: 0,
            malformed: false,
        }
    }

    /// Read the next line into `line`, replacing its contents.
    ///
    /// Returns `Ok(false)` at end of input.
    pub fn read_line(&mut self, line: &mut String) -> io::Result<bool> {
        line.clear();

        loop {
            if let Some((end, terminator_len)) = self.find_terminator() {
                let start = self.consumed;
                line.push_str(&self.pending[start..start + end]);
                self.consumed = start + end + terminator_len;
                return Ok(true);
            }

            if self.eof {
                if self.consumed == self.pending.len() {
                    return Ok(false);
                }
                line.push_str(&self.pending[self.consumed..]);
                self.consumed = self.pending.len();
                return Ok(true);
            }

            self.fill()?;
        }
    }

    /// Offset and length of the first terminator in the unread text.
    ///
    /// A `\r` at the very end of the buffer is ambiguous until the next
    /// chunk shows whether a `\n` follows. Text already searched is not
    /// searched again, so a line spanning many chunks stays linear.
    fn find_terminator(&mut self) -> Option<(usize, usize)> {
        let start = self.scanned.max(self.consumed);
        let Some(found) = self.pending[start..].find(|c: char| c == '\r' || c == '\n') else {
            self.scanned = self.pending.len();
            return None;
        };

        let idx = start + found;
        let end = idx - self.consumed;
        let bytes = self.pending.as_bytes();
        if bytes[idx] == b'\n' {
            return Some((end, 1));
        }
        match bytes.get(idx + 1) {
            Some(b'\n') => Some((end, 2)),
            Some(_) => Some((end, 1)),
            None if self.eof => Some((end, 1)),
            None => {
                self.scanned = idx;
                None
            }
        }
    }

    /// Decode the next chunk of input into `pending`
    fn fill(&mut self) -> io::Result<()> {
        if self.consumed > 0 {
            self.pending.drain(..self.consumed);
            self.scanned = self.scanned.saturating_sub(self.consumed);
            self.consumed = 0;
        }

        let chunk = self.inner.fill_buf()?;
        let last = chunk.is_empty();

        let needed = self
            .decoder
            .max_utf8_buffer_length(chunk.len())
            .ok_or_else(buffer_overflow)?;
        self.pending.reserve(needed);

        let (result, read, replaced) =
            self.decoder.decode_to_string(chunk, &mut self.pending, last);
        self.inner.consume(read);
        self.bytes_read += read as u64;
        self.malformed |= replaced;

        if last && matches!(result, CoderResult::InputEmpty) {
            self.eof = true;
        }
        Ok(())
    }

    /// Raw bytes consumed so far, including any BOM the decoder removed
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether any malformed sequence was replaced with U+FFFD
    pub fn had_malformed_input(&self) -> bool {
        self.malformed
    }

    /// The codec decoding the input
    pub fn codec(&self) -> &'static Codec {
        self.decoder.encoding()
    }
}

enum Sink {
    Utf8,
    Utf16Le,
    Utf16Be,
    Legacy(Encoder),
}

/// Writes lines to a byte stream in a target encoding
pub struct LineWriter<W: Write> {
    inner: W,
    codec: &'static Codec,
    sink: Sink,
    policy: UnmappablePolicy,
    line_ending: LineEnding,
    scratch: Vec<u8>,
    bytes_written: u64,
    substitutions: usize,
}

impl<W: Write> LineWriter<W> {
    /// Wrap `inner`, writing `bom` first if given.
    ///
    /// UTF-16 is encoded here directly since encoding_rs only decodes it.
    pub fn new(
        inner: W,
        codec: &'static Codec,
        bom: Option<Bom>,
        policy: UnmappablePolicy,
        line_ending: LineEnding,
    ) -> io::Result<Self> {
        let sink = if codec == UTF_8 {
            Sink::Utf8
        } else if codec == UTF_16LE {
            Sink::Utf16Le
        } else if codec == UTF_16BE {
            Sink::Utf16Be
        } else {
            Sink::Legacy(codec.new_encoder())
        };

        let mut writer = Self {
            inner,
            codec,
            sink,
            policy,
            line_ending,
            scratch: Vec::new(),
            bytes_written: 0,
            substitutions: 0,
        };

        if let Some(bom) = bom {
            writer.scratch.extend_from_slice(bom.bytes());
            writer.flush_scratch()?;
        }
        Ok(writer)
    }

    /// Encode `line` followed by the line terminator
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let terminator = self.line_ending.as_str();
        self.encode(line, false)?;
        self.encode(terminator, false)?;
        self.flush_scratch()
    }

    /// Flush encoder state and the underlying writer.
    ///
    /// Stateful encodings such as ISO-2022-JP may emit a final escape
    /// sequence here.
    pub fn finish(&mut self) -> io::Result<()> {
        self.encode("", true)?;
        self.flush_scratch()?;
        self.inner.flush()
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Encoded bytes handed to the underlying writer, BOM included
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Number of unmappable characters substituted
    pub fn substitutions(&self) -> usize {
        self.substitutions
    }

    /// The codec encoding the output
    pub fn codec(&self) -> &'static Codec {
        self.codec
    }

    fn encode(&mut self, text: &str, last: bool) -> io::Result<()> {
        match &mut self.sink {
            Sink::Utf8 => self.scratch.extend_from_slice(text.as_bytes()),
            Sink::Utf16Le => {
                for unit in text.encode_utf16() {
                    self.scratch.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Sink::Utf16Be => {
                for unit in text.encode_utf16() {
                    self.scratch.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Sink::Legacy(encoder) => {
                let mut rest = text;
                while let Some((character, read)) =
                    encode_until_unmappable(encoder, rest, &mut self.scratch, last)?
                {
                    rest = &rest[read..];
                    match self.policy {
                        UnmappablePolicy::Strict => {
                            return Err(io::Error::new(
                                io::ErrorKind::InvalidData,
                                UnmappableError {
                                    character,
                                    encoding: encoder.encoding().name(),
                                },
                            ));
                        }
                        UnmappablePolicy::Replace => {
                            encode_until_unmappable(encoder, "?", &mut self.scratch, last)?;
                        }
                        UnmappablePolicy::NumericCharRef => {
                            let reference = format!("&#{};", character as u32);
                            encode_until_unmappable(encoder, &reference, &mut self.scratch, last)?;
                        }
                    }
                    self.substitutions += 1;
                }
            }
        }
        Ok(())
    }

    fn flush_scratch(&mut self) -> io::Result<()> {
        if !self.scratch.is_empty() {
            self.inner.write_all(&self.scratch)?;
            self.bytes_written += self.scratch.len() as u64;
            self.scratch.clear();
        }
        Ok(())
    }
}

/// Encode `src` into `dst` until it is used up or an unmappable character
/// is reached.
///
/// On an unmappable character returns it together with the number of bytes
/// of `src` consumed, the character included.
fn encode_until_unmappable(
    encoder: &mut Encoder,
    src: &str,
    dst: &mut Vec<u8>,
    last: bool,
) -> io::Result<Option<(char, usize)>> {
    let mut consumed = 0;

    loop {
        let rest = &src[consumed..];
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .ok_or_else(buffer_overflow)?;
        dst.reserve(needed);

        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, dst, last);
        consumed += read;

        match result {
            EncoderResult::InputEmpty => return Ok(None),
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(character) => return Ok(Some((character, consumed))),
        }
    }
}

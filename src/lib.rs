//! # convert-text - Text File Encoding Converter
//!
//! Converts a text file from one character encoding to another, line by
//! line, optionally replacing the original file in place.
//!
//! ## Features
//!
//! - **Symbolic encodings** `UTF8`, `UNICODE` (UTF-16LE), `UNICODE_BE` and `ANSI`
//! - **Legacy codepages** by number or by 3-letter language code
//! - **BOM auto-detection** with an explicit fallback codepage
//! - **Streaming** conversion that never holds the whole file in memory
//! - **Safe replace** of the original file via rename-over-existing
//!
//! ## Quick Start
//!
//! ```rust
//! use convert_text::{resolve_encoding, ByteOrder, ConfigError, EncodingName};
//!
//! let output = resolve_encoding(Some("unicode"), None, None).unwrap();
//! assert_eq!(output.name(), EncodingName::Unicode);
//! assert_eq!(output.byte_order(), ByteOrder::LittleEndian);
//!
//! let greek = resolve_encoding(Some("ANSI"), None, Some("gre")).unwrap();
//! assert_eq!(greek.codepage(), Some(1253));
//!
//! // A codepage only makes sense for ANSI
//! let err = resolve_encoding(Some("UTF8"), Some(1252), None).unwrap_err();
//! assert!(matches!(err, ConfigError::CodepageRequiresAnsi { .. }));
//! ```
//!
//! Converting a file:
//!
//! ```no_run
//! use convert_text::{convert, resolve_encoding, ConversionJob};
//!
//! let output = resolve_encoding(Some("UNICODE"), None, None)?;
//! let job = ConversionJob::new("in.txt", "out.txt", output);
//! let summary = convert(job)?;
//! println!("{} lines written", summary.lines);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use encoding_rs::{Encoding as Codec, UTF_8, UTF_16BE, UTF_16LE};

pub mod codepage;
pub mod convert;
pub mod detection;
pub mod resolve;
pub mod stream;

pub use convert::{ConversionJob, ConversionSummary, ReplaceStrategy, convert, replace_original};
pub use detection::Bom;
pub use resolve::resolve_encoding;
pub use stream::{LineEnding, UnmappableError, UnmappablePolicy};

/// Codepage used for auto-detect fallback and bare `ANSI` unless configured
pub const DEFAULT_NATIVE_CODEPAGE: u16 = 1252;

/// Errors in the requested encoding configuration, raised before any I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Encoding name is not one of `UTF8`, `UNICODE`, `UNICODE_BE`, `ANSI`
    InvalidEncodingName {
        /// The rejected token
        name: String,
    },
    /// A numeric codepage was given for a non-ANSI encoding
    CodepageRequiresAnsi {
        /// The encoding the codepage was given for
        name: EncodingName,
    },
    /// A language code was given for a non-ANSI encoding
    LanguageCodeRequiresAnsi {
        /// The encoding the language code was given for
        name: EncodingName,
    },
    /// Both a numeric codepage and a language code were given
    ConflictingCodepage,
    /// Language code has no codepage mapping
    UnknownLanguageCode {
        /// The rejected code, trimmed
        code: String,
    },
    /// No codec is installed for the codepage
    UnsupportedCodepage {
        /// The rejected codepage
        codepage: u32,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidEncodingName { name } => write!(
                f,
                "Unknown encoding '{}' (expected UTF8, UNICODE, UNICODE_BE or ANSI)",
                name
            ),
            ConfigError::CodepageRequiresAnsi { name } => {
                write!(f, "Codepage specified, but mode is {} instead of ANSI", name)
            }
            ConfigError::LanguageCodeRequiresAnsi { name } => {
                write!(f, "Language specified, but mode is {} instead of ANSI", name)
            }
            ConfigError::ConflictingCodepage => {
                write!(f, "Specify either a codepage or a language, not both")
            }
            ConfigError::UnknownLanguageCode { code } => write!(f, "Invalid language {}", code),
            ConfigError::UnsupportedCodepage { codepage } => {
                write!(f, "Invalid codepage {}, installed codepages are", codepage)?;
                for (i, installed) in crate::codepage::INSTALLED_CODEPAGES.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{}", sep, installed)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Comparable discriminant of a [`ConversionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionErrorKind {
    /// See [`ConversionError::FileNotFound`]
    FileNotFound,
    /// See [`ConversionError::FileOpenFailed`]
    FileOpenFailed,
    /// See [`ConversionError::ReadFailed`]
    ReadFailed,
    /// See [`ConversionError::WriteFailed`]
    WriteFailed,
    /// See [`ConversionError::Unmappable`]
    Unmappable,
    /// See [`ConversionError::StreamCloseFailed`]
    StreamCloseFailed,
    /// See [`ConversionError::ReplaceFailed`]
    ReplaceFailed,
}

/// Errors raised while converting a file
#[derive(Debug)]
pub enum ConversionError {
    /// Input file does not exist
    FileNotFound {
        /// Input path
        path: PathBuf,
    },
    /// A file could not be opened or created
    FileOpenFailed {
        /// Path that failed to open
        path: PathBuf,
        /// Underlying cause
        source: io::Error,
    },
    /// Reading the input failed mid-stream
    ReadFailed {
        /// Input path
        path: PathBuf,
        /// Underlying cause
        source: io::Error,
    },
    /// Writing the output failed mid-stream
    WriteFailed {
        /// Output path
        path: PathBuf,
        /// Underlying cause
        source: io::Error,
    },
    /// A character has no representation in the output encoding and the
    /// unmappable policy is strict
    Unmappable {
        /// One-based line number
        line: usize,
        /// The offending character
        character: char,
        /// Output codec name
        encoding: &'static str,
    },
    /// Flushing or closing the output failed
    StreamCloseFailed {
        /// Output path
        path: PathBuf,
        /// Underlying cause
        source: io::Error,
    },
    /// Replacing the original with the converted file failed
    ReplaceFailed {
        /// The original file
        path: PathBuf,
        /// Where the converted file was left
        temporary: PathBuf,
        /// Underlying cause
        source: io::Error,
    },
}

impl ConversionError {
    /// Discriminant for matching without destructuring
    pub fn kind(&self) -> ConversionErrorKind {
        match self {
            ConversionError::FileNotFound { .. } => ConversionErrorKind::FileNotFound,
            ConversionError::FileOpenFailed { .. } => ConversionErrorKind::FileOpenFailed,
            ConversionError::ReadFailed { .. } => ConversionErrorKind::ReadFailed,
            ConversionError::WriteFailed { .. } => ConversionErrorKind::WriteFailed,
            ConversionError::Unmappable { .. } => ConversionErrorKind::Unmappable,
            ConversionError::StreamCloseFailed { .. } => ConversionErrorKind::StreamCloseFailed,
            ConversionError::ReplaceFailed { .. } => ConversionErrorKind::ReplaceFailed,
        }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::FileNotFound { path } => {
                write!(f, "Input file {} not found", path.display())
            }
            ConversionError::FileOpenFailed { path, source } => {
                write!(f, "Failed to open {}: {}", path.display(), source)
            }
            ConversionError::ReadFailed { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            ConversionError::WriteFailed { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            ConversionError::Unmappable {
                line,
                character,
                encoding,
            } => write!(
                f,
                "Cannot encode character '{}' (U+{:04X}) on line {} in {}",
                character, *character as u32, line, encoding
            ),
            ConversionError::StreamCloseFailed { path, source } => {
                write!(f, "Failed to close {}: {}", path.display(), source)
            }
            ConversionError::ReplaceFailed {
                path,
                temporary,
                source,
            } => write!(
                f,
                "Failed to replace {} (converted file left at {}): {}",
                path.display(),
                temporary.display(),
                source
            ),
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConversionError::FileOpenFailed { source, .. }
            | ConversionError::ReadFailed { source, .. }
            | ConversionError::WriteFailed { source, .. }
            | ConversionError::StreamCloseFailed { source, .. }
            | ConversionError::ReplaceFailed { source, .. } => Some(source),
            ConversionError::FileNotFound { .. } | ConversionError::Unmappable { .. } => None,
        }
    }
}

/// Symbolic encoding names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingName {
    /// UTF-8
    Utf8,
    /// UTF-16 little endian
    Unicode,
    /// UTF-16 big endian
    UnicodeBe,
    /// A legacy codepage; the native one unless a codepage is given
    Ansi,
    /// Auto-detect from the BOM, else the native codepage
    Default,
}

impl EncodingName {
    /// Command-line token for this name
    pub fn token(self) -> &'static str {
        match self {
            EncodingName::Utf8 => "UTF8",
            EncodingName::Unicode => "UNICODE",
            EncodingName::UnicodeBe => "UNICODE_BE",
            EncodingName::Ansi => "ANSI",
            EncodingName::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for EncodingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for EncodingName {
    type Err = ConfigError;

    /// Parse one of the four selectable tokens, ignoring case and
    /// surrounding whitespace. `DEFAULT` is not selectable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = match s.trim().to_ascii_uppercase().as_str() {
            "UTF8" => EncodingName::Utf8,
            "UNICODE" => EncodingName::Unicode,
            "UNICODE_BE" => EncodingName::UnicodeBe,
            "ANSI" => EncodingName::Ansi,
            _ => {
                return Err(ConfigError::InvalidEncodingName {
                    name: s.trim().to_string(),
                });
            }
        };
        Ok(name)
    }
}

/// Byte order of a multi-byte code unit encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first
    LittleEndian,
    /// Most significant byte first
    BigEndian,
    /// Single-byte or byte-oriented encodings
    NotApplicable,
}

/// A concrete text encoding: symbolic kind, codepage, byte order and BOM use.
///
/// A codepage is only ever attached to [`EncodingName::Ansi`]; the
/// constructors are the only way to build one, so the invariant holds for
/// every value. An `Ansi` descriptor without a codepage stands for the
/// native codepage the conversion is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodingDescriptor {
    name: EncodingName,
    codepage: Option<u16>,
    byte_order: ByteOrder,
    uses_bom: bool,
}

impl EncodingDescriptor {
    /// UTF-8, written with a BOM
    pub fn utf8() -> Self {
        Self {
            name: EncodingName::Utf8,
            codepage: None,
            byte_order: ByteOrder::NotApplicable,
            uses_bom: true,
        }
    }

    /// UTF-16LE, written with a BOM
    pub fn unicode() -> Self {
        Self {
            name: EncodingName::Unicode,
            codepage: None,
            byte_order: ByteOrder::LittleEndian,
            uses_bom: true,
        }
    }

    /// UTF-16BE, written with a BOM
    pub fn unicode_be() -> Self {
        Self {
            name: EncodingName::UnicodeBe,
            codepage: None,
            byte_order: ByteOrder::BigEndian,
            uses_bom: true,
        }
    }

    /// The native codepage.
    ///
    /// Bare `ANSI` is not an ASCII mapping: characters the native codepage
    /// can represent survive, and only the rest are unmappable.
    pub fn ansi() -> Self {
        Self {
            name: EncodingName::Ansi,
            codepage: None,
            byte_order: ByteOrder::NotApplicable,
            uses_bom: false,
        }
    }

    /// A specific codepage; fails unless a codec is installed for it
    pub fn ansi_codepage(codepage: u16) -> Result<Self, ConfigError> {
        if codepage::codec_for_codepage(codepage).is_none() {
            return Err(ConfigError::UnsupportedCodepage {
                codepage: codepage.into(),
            });
        }
        Ok(Self {
            codepage: Some(codepage),
            ..Self::ansi()
        })
    }

    /// Auto-detect from the BOM, falling back to the native codepage
    pub fn auto_detect() -> Self {
        Self {
            name: EncodingName::Default,
            codepage: None,
            byte_order: ByteOrder::NotApplicable,
            uses_bom: false,
        }
    }

    /// Descriptor for a symbolic name with no codepage attached
    pub fn from_name(name: EncodingName) -> Self {
        match name {
            EncodingName::Utf8 => Self::utf8(),
            EncodingName::Unicode => Self::unicode(),
            EncodingName::UnicodeBe => Self::unicode_be(),
            EncodingName::Ansi => Self::ansi(),
            EncodingName::Default => Self::auto_detect(),
        }
    }

    /// Same encoding, written without a BOM
    pub fn without_bom(self) -> Self {
        Self {
            uses_bom: false,
            ..self
        }
    }

    /// Symbolic name
    pub fn name(&self) -> EncodingName {
        self.name
    }

    /// Attached codepage, only ever set for `Ansi`
    pub fn codepage(&self) -> Option<u16> {
        self.codepage
    }

    /// Byte order of code units
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Whether output in this encoding starts with a BOM
    pub fn uses_bom(&self) -> bool {
        self.uses_bom
    }

    /// Whether the decoder should detect the encoding itself
    pub fn is_auto_detect(&self) -> bool {
        self.name == EncodingName::Default
    }

    /// The BOM written ahead of output, if any
    pub fn bom(&self) -> Option<Bom> {
        if !self.uses_bom {
            return None;
        }
        match self.name {
            EncodingName::Utf8 => Some(Bom::Utf8),
            EncodingName::Unicode => Some(Bom::Utf16Le),
            EncodingName::UnicodeBe => Some(Bom::Utf16Be),
            EncodingName::Ansi | EncodingName::Default => None,
        }
    }

    /// Concrete codec, or `None` when the native codepage is meant
    pub fn codec(&self) -> Option<&'static Codec> {
        match self.name {
            EncodingName::Utf8 => Some(UTF_8),
            EncodingName::Unicode => Some(UTF_16LE),
            EncodingName::UnicodeBe => Some(UTF_16BE),
            EncodingName::Ansi => self.codepage.and_then(codepage::codec_for_codepage),
            EncodingName::Default => None,
        }
    }
}

impl fmt::Display for EncodingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.codepage {
            Some(codepage) => write!(f, "{} (codepage {})", self.name, codepage),
            None => write!(f, "{}", self.name),
        }
    }
}

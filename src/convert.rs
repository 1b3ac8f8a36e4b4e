//! The conversion engine: stream a file line by line from one encoding to
//! another, then optionally replace the original with the result.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};

use encoding_rs::{Decoder, Encoding as Codec, WINDOWS_1252};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::detection::{detect_bom, read_prefix};
use crate::stream::{LineEnding, LineReader, LineWriter, UnmappableError, UnmappablePolicy};
use crate::{ConversionError, EncodingDescriptor, EncodingName};

/// How the converted file takes the place of the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplaceStrategy {
    /// One rename over the existing file. The original path always holds
    /// either the old or the new content.
    #[default]
    Atomic,
    /// Delete the original, then rename. A crash between the two steps
    /// leaves nothing at the original path.
    DeleteThenRename,
}

/// One conversion request, consumed by [`convert`]
#[derive(Debug, Clone)]
pub struct ConversionJob {
    input_path: PathBuf,
    output_path: PathBuf,
    replace_in_place: bool,
    input_encoding: Option<EncodingDescriptor>,
    output_encoding: EncodingDescriptor,
    fallback_encoding: EncodingDescriptor,
    unmappable: UnmappablePolicy,
    line_ending: LineEnding,
    replace_strategy: ReplaceStrategy,
}

impl ConversionJob {
    /// Convert `input_path` into `output_path`, auto-detecting the input
    /// encoding
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        output_encoding: EncodingDescriptor,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            replace_in_place: false,
            input_encoding: None,
            output_encoding,
            fallback_encoding: EncodingDescriptor::ansi(),
            unmappable: UnmappablePolicy::default(),
            line_ending: LineEnding::default(),
            replace_strategy: ReplaceStrategy::default(),
        }
    }

    /// Decode the input as `encoding`; `None` auto-detects
    pub fn with_input_encoding(mut self, encoding: Option<EncodingDescriptor>) -> Self {
        self.input_encoding = encoding;
        self
    }

    /// After converting, replace the input with the output.
    ///
    /// The output path then serves as the temporary file and must differ
    /// from the input path.
    pub fn replace_in_place(mut self, replace: bool) -> Self {
        self.replace_in_place = replace;
        self
    }

    /// Native encoding used when no BOM is found and for bare `ANSI`.
    ///
    /// Anything without a concrete codec means codepage 1252.
    pub fn with_fallback_encoding(mut self, encoding: EncodingDescriptor) -> Self {
        self.fallback_encoding = encoding;
        self
    }

    /// Policy for characters the output encoding cannot represent
    pub fn with_unmappable(mut self, policy: UnmappablePolicy) -> Self {
        self.unmappable = policy;
        self
    }

    /// Terminator written after each line
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// How the output replaces the input in replace mode
    pub fn with_replace_strategy(mut self, strategy: ReplaceStrategy) -> Self {
        self.replace_strategy = strategy;
        self
    }

    fn fallback_codec(&self) -> &'static Codec {
        self.fallback_encoding.codec().unwrap_or(WINDOWS_1252)
    }
}

/// Outcome of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// Codec the input was decoded with
    pub input_encoding: &'static str,
    /// Codec the output was encoded with
    pub output_encoding: &'static str,
    /// Lines written
    pub lines: usize,
    /// Bytes read from the input
    pub bytes_read: u64,
    /// Bytes written to the output, BOM included
    pub bytes_written: u64,
    /// Malformed input was replaced with U+FFFD
    pub malformed_input: bool,
    /// Unmappable characters substituted in the output
    pub substitutions: usize,
    /// The original file was replaced
    pub replaced: bool,
}

/// Run a conversion job.
///
/// Streams the input one line at a time; nothing beyond the current chunk
/// and line is held in memory. Every file handle is closed before this
/// returns, on success and on failure. In replace mode a failure before the
/// replace step removes the partial output; a failed replace leaves the
/// original untouched and the converted file at the output path.
pub fn convert(job: ConversionJob) -> Result<ConversionSummary, ConversionError> {
    if same_file(&job.input_path, &job.output_path) {
        let err = ConversionError::FileOpenFailed {
            path: job.output_path.clone(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "input and output refer to the same file",
            ),
        };
        error!("{}", err);
        return Err(err);
    }

    let input = File::open(&job.input_path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ConversionError::FileNotFound {
                path: job.input_path.clone(),
            },
            _ => ConversionError::FileOpenFailed {
                path: job.input_path.clone(),
                source,
            },
        })
        .inspect_err(|err| error!("{}", err))?;

    let output = File::create(&job.output_path)
        .map_err(|source| ConversionError::FileOpenFailed {
            path: job.output_path.clone(),
            source,
        })
        .inspect_err(|err| error!("{}", err))?;

    let mut summary = match transcode(&job, input, output) {
        Ok(summary) => summary,
        Err(err) => {
            error!("{}", err);
            if job.replace_in_place {
                discard_partial(&job.output_path);
            }
            return Err(err);
        }
    };

    if summary.malformed_input {
        warn!(
            "{} contained malformed {} sequences, replaced with U+FFFD",
            job.input_path.display(),
            summary.input_encoding
        );
    }
    if summary.substitutions > 0 {
        warn!(
            "{} character(s) could not be represented in {} and were substituted",
            summary.substitutions, summary.output_encoding
        );
    }

    if job.replace_in_place {
        replace_original(&job.output_path, &job.input_path, job.replace_strategy)
            .inspect_err(|err| error!("{}", err))?;
        summary.replaced = true;
    }

    info!(
        "Converted {} ({}) to {} ({}): {} lines",
        job.input_path.display(),
        summary.input_encoding,
        if summary.replaced {
            job.input_path.display()
        } else {
            job.output_path.display()
        },
        summary.output_encoding,
        summary.lines
    );
    Ok(summary)
}

/// Put `converted` in place of `original`.
///
/// On failure `original` is left as it was and `converted` stays where it
/// is. With [`ReplaceStrategy::DeleteThenRename`] that only holds up to the
/// delete; a failing rename after it leaves nothing at `original`.
pub fn replace_original(
    converted: &Path,
    original: &Path,
    strategy: ReplaceStrategy,
) -> Result<(), ConversionError> {
    let replace_failed = |source| ConversionError::ReplaceFailed {
        path: original.to_path_buf(),
        temporary: converted.to_path_buf(),
        source,
    };

    debug!(
        "Replacing {} with {} ({:?})",
        original.display(),
        converted.display(),
        strategy
    );

    match strategy {
        ReplaceStrategy::Atomic => fs::rename(converted, original).map_err(replace_failed),
        ReplaceStrategy::DeleteThenRename => {
            // Never delete the original without a converted file to take its place
            fs::metadata(converted).map_err(replace_failed)?;
            fs::remove_file(original).map_err(replace_failed)?;
            fs::rename(converted, original).map_err(replace_failed)
        }
    }
}

fn transcode(
    job: &ConversionJob,
    mut input: File,
    output: File,
) -> Result<ConversionSummary, ConversionError> {
    let read_failed = |source| ConversionError::ReadFailed {
        path: job.input_path.clone(),
        source,
    };
    let write_failed = |source| ConversionError::WriteFailed {
        path: job.output_path.clone(),
        source,
    };
    let close_failed = |source| ConversionError::StreamCloseFailed {
        path: job.output_path.clone(),
        source,
    };

    let prefix = read_prefix(&mut input).map_err(read_failed)?;
    let decoder = input_decoder(job, &prefix);
    let mut reader = LineReader::new(BufReader::new(Cursor::new(prefix).chain(input)), decoder);

    let output_codec = job.output_encoding.codec().unwrap_or_else(|| job.fallback_codec());
    debug!(
        "Encoding output as {} ({})",
        job.output_encoding,
        output_codec.name()
    );
    let mut writer = LineWriter::new(
        BufWriter::new(output),
        output_codec,
        job.output_encoding.bom(),
        job.unmappable,
        job.line_ending,
    )
    .map_err(write_failed)?;

    let mut line = String::new();
    let mut lines = 0;
    while reader.read_line(&mut line).map_err(read_failed)? {
        lines += 1;
        writer
            .write_line(&line)
            .map_err(|source| match unmappable_cause(&source) {
                Some(cause) => ConversionError::Unmappable {
                    line: lines,
                    character: cause.character(),
                    encoding: cause.encoding(),
                },
                None => write_failed(source),
            })?;
    }

    writer.finish().map_err(close_failed)?;
    let summary = ConversionSummary {
        input_encoding: reader.codec().name(),
        output_encoding: output_codec.name(),
        lines,
        bytes_read: reader.bytes_read(),
        bytes_written: writer.bytes_written(),
        malformed_input: reader.had_malformed_input(),
        substitutions: writer.substitutions(),
        replaced: false,
    };

    let file = writer
        .into_inner()
        .into_inner()
        .map_err(|err| close_failed(err.into_error()))?;
    if job.replace_in_place {
        file.sync_all().map_err(close_failed)?;
    }

    Ok(summary)
}

/// Pick the decoder from the job and the first bytes of the input
fn input_decoder(job: &ConversionJob, prefix: &[u8]) -> Decoder {
    let bom = detect_bom(prefix);

    match job.input_encoding {
        Some(explicit) if !explicit.is_auto_detect() => {
            let codec = explicit.codec().unwrap_or_else(|| job.fallback_codec());
            if let Some(bom) = bom {
                if bom.codec() != codec {
                    warn!(
                        "{} starts with a {} byte-order mark but is decoded as {}",
                        job.input_path.display(),
                        bom.encoding_name(),
                        codec.name()
                    );
                }
            }
            debug!("Decoding input as {} ({})", explicit, codec.name());
            codec.new_decoder_with_bom_removal()
        }
        _ => match bom {
            Some(bom) => {
                debug!("Detected {} byte-order mark", bom.encoding_name());
                bom.codec().new_decoder_with_bom_removal()
            }
            None => {
                let fallback = job.fallback_codec();
                debug!(
                    "No byte-order mark, decoding as {} ({})",
                    EncodingName::Ansi,
                    fallback.name()
                );
                fallback.new_decoder_without_bom_handling()
            }
        },
    }
}

fn unmappable_cause(err: &io::Error) -> Option<&UnmappableError> {
    err.get_ref()?.downcast_ref::<UnmappableError>()
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", path.display(), e),
    }
}

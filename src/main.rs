//! # convert-text CLI
//!
//! Converts one text file between encodings. Accepts the legacy
//! single-dash, case-insensitive flag style (`-input`, `-OUTPUT`).

#[cfg(feature = "cli")]
use std::ffi::OsString;
#[cfg(feature = "cli")]
use std::fmt;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};
#[cfg(feature = "cli")]
use std::process::ExitCode;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{CommandFactory, Parser, ValueEnum, error::ErrorKind};
#[cfg(feature = "cli")]
use log::{LevelFilter, debug};
#[cfg(feature = "cli")]
use serde::Serialize;

#[cfg(feature = "cli")]
use convert_text::{
    ConfigError, ConversionError, ConversionErrorKind, ConversionJob, ConversionSummary,
    DEFAULT_NATIVE_CODEPAGE, LineEnding, ReplaceStrategy, UnmappablePolicy, convert,
    resolve_encoding,
};

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI features disabled. Enable with --features cli");
    std::process::exit(1);
}

#[cfg(feature = "cli")]
const EXIT_USAGE: u8 = 1;
#[cfg(feature = "cli")]
const EXIT_NOT_FOUND: u8 = 2;
#[cfg(feature = "cli")]
const EXIT_FAILED: u8 = 3;

/// Suffix of the temporary file used by `-replace` with a single file
#[cfg(feature = "cli")]
const WORK_SUFFIX: &str = ".convertwork";

/// convert-text: convert a text file between character encodings
#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "convert-text")]
#[command(version, about, long_about = None)]
#[command(after_help = "Example: convert-text -output Unicode testIn.txt testOut.txt")]
struct Cli {
    /// Input encoding (UTF8, UNICODE, UNICODE_BE, ANSI); auto-detected if absent
    #[arg(long, value_name = "ENCODING")]
    input: Option<String>,

    /// Output encoding (UTF8, UNICODE, UNICODE_BE, ANSI)
    #[arg(long, value_name = "ENCODING")]
    output: String,

    /// Input codepage, requires -input ANSI
    #[arg(long, value_name = "CODEPAGE")]
    inputcp: Option<u32>,

    /// Output codepage, requires -output ANSI
    #[arg(long, value_name = "CODEPAGE")]
    outputcp: Option<u32>,

    /// Input language code (e.g. ENG), requires -input ANSI
    #[arg(long, value_name = "LANCODE")]
    inputlan: Option<String>,

    /// Output language code (e.g. ENG), requires -output ANSI
    #[arg(long, value_name = "LANCODE")]
    outputlan: Option<String>,

    /// Replace the input file with the converted output
    #[arg(long)]
    replace: bool,

    /// Write the output without a byte-order mark
    #[arg(long)]
    nobom: bool,

    /// Handling of characters the output encoding cannot represent
    #[arg(long, value_enum, default_value = "replace")]
    unmappable: UnmappableArg,

    /// Line terminator written after each line
    #[arg(long, value_enum, default_value = "native")]
    newline: NewlineArg,

    /// Codepage assumed for input without a BOM and for bare ANSI
    #[arg(
        long,
        env = "CONVERT_TEXT_NATIVE_CP",
        value_name = "CODEPAGE",
        default_value_t = u32::from(DEFAULT_NATIVE_CODEPAGE)
    )]
    nativecp: u32,

    /// With -replace, delete the original before renaming the output
    #[arg(long)]
    legacyreplace: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// <InputFile> [OutputFile]; OutputFile may be omitted with -replace
    #[arg(required = true, num_args = 1..=2, value_name = "FILES")]
    files: Vec<PathBuf>,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnmappableArg {
    /// Substitute '?'
    Replace,
    /// Substitute a numeric character reference such as &#26085;
    Ncr,
    /// Fail the conversion
    Strict,
}

#[cfg(feature = "cli")]
impl From<UnmappableArg> for UnmappablePolicy {
    fn from(arg: UnmappableArg) -> Self {
        match arg {
            UnmappableArg::Replace => UnmappablePolicy::Replace,
            UnmappableArg::Ncr => UnmappablePolicy::NumericCharRef,
            UnmappableArg::Strict => UnmappablePolicy::Strict,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, Debug, ValueEnum)]
enum NewlineArg {
    /// CRLF on Windows, LF elsewhere
    Native,
    Crlf,
    Lf,
}

#[cfg(feature = "cli")]
impl From<NewlineArg> for LineEnding {
    fn from(arg: NewlineArg) -> Self {
        match arg {
            NewlineArg::Native => LineEnding::native(),
            NewlineArg::Crlf => LineEnding::CrLf,
            NewlineArg::Lf => LineEnding::Lf,
        }
    }
}

/// Argument combination clap cannot express
#[cfg(feature = "cli")]
#[derive(Debug)]
struct UsageError(&'static str);

#[cfg(feature = "cli")]
impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[cfg(feature = "cli")]
impl std::error::Error for UsageError {}

#[cfg(feature = "cli")]
#[derive(Serialize)]
struct ConversionReport<'a> {
    success: bool,
    input: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a ConversionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    processing_time_ms: u64,
}

#[cfg(feature = "cli")]
fn main() -> ExitCode {
    let args = normalize_legacy_args(std::env::args_os());
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    init_logging(cli.verbose);

    let start_time = Instant::now();
    let result = run(&cli);
    let processing_time = start_time.elapsed();

    match cli.format {
        OutputFormat::Json => print_json_report(&cli, &result, processing_time),
        OutputFormat::Text => print_text_report(&cli, &result, processing_time),
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => ExitCode::from(exit_code_for(&err)),
    }
}

/// Rewrite legacy flags such as `-Input` into clap's `--input`.
///
/// Only tokens that look like a word flag are touched; values, single-letter
/// short flags and everything after `--` pass through unchanged.
#[cfg(feature = "cli")]
fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut seen_terminator = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || seen_terminator {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };
            if text == "--" {
                seen_terminator = true;
                return arg;
            }
            let word = text
                .strip_prefix("--")
                .or_else(|| text.strip_prefix('-'))
                .unwrap_or_default();
            if word.len() > 1 && word.chars().all(|c| c.is_ascii_alphabetic()) {
                OsString::from(format!("--{}", word.to_ascii_lowercase()))
            } else {
                arg
            }
        })
        .collect()
}

#[cfg(feature = "cli")]
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[cfg(feature = "cli")]
fn run(cli: &Cli) -> Result<ConversionSummary> {
    let input_encoding = resolve_encoding(
        cli.input.as_deref(),
        cli.inputcp,
        cli.inputlan.as_deref(),
    )
    .context("Invalid input encoding")?;

    let mut output_encoding = resolve_encoding(
        Some(cli.output.as_str()),
        cli.outputcp,
        cli.outputlan.as_deref(),
    )
    .context("Invalid output encoding")?;
    if cli.nobom {
        output_encoding = output_encoding.without_bom();
    }

    let fallback_encoding = resolve_encoding(Some("ANSI"), Some(cli.nativecp), None)
        .context("Invalid native codepage")?;

    let (input_path, output_path) = job_paths(cli)?;
    debug!(
        "Converting {} ({}) to {} ({})",
        input_path.display(),
        input_encoding,
        output_path.display(),
        output_encoding
    );

    let replace_strategy = if cli.legacyreplace {
        ReplaceStrategy::DeleteThenRename
    } else {
        ReplaceStrategy::Atomic
    };

    let job = ConversionJob::new(&input_path, &output_path, output_encoding)
        .with_input_encoding(Some(input_encoding))
        .with_fallback_encoding(fallback_encoding)
        .with_unmappable(cli.unmappable.into())
        .with_line_ending(cli.newline.into())
        .replace_in_place(cli.replace)
        .with_replace_strategy(replace_strategy);

    convert(job).with_context(|| format!("Error converting file {}", input_path.display()))
}

/// Input and output paths; with `-replace` and a single file the output is
/// a temporary file next to the input
#[cfg(feature = "cli")]
fn job_paths(cli: &Cli) -> Result<(PathBuf, PathBuf)> {
    match (cli.files.as_slice(), cli.replace) {
        ([input, output], _) => Ok((input.clone(), output.clone())),
        ([input], true) => {
            let mut work = input.as_os_str().to_owned();
            work.push(WORK_SUFFIX);
            Ok((input.clone(), PathBuf::from(work)))
        }
        ([_], false) => {
            Err(UsageError("An OutputFile is required unless -replace is given").into())
        }
        _ => Err(UsageError("Expected <InputFile> [OutputFile]").into()),
    }
}

/// Where the converted text ends up, if the arguments got that far
#[cfg(feature = "cli")]
fn destination(cli: &Cli) -> Option<&Path> {
    if cli.replace {
        cli.files.first().map(PathBuf::as_path)
    } else {
        cli.files.get(1).map(PathBuf::as_path)
    }
}

#[cfg(feature = "cli")]
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<UsageError>().is_some() {
        return EXIT_USAGE;
    }
    match err.downcast_ref::<ConversionError>().map(ConversionError::kind) {
        Some(ConversionErrorKind::FileNotFound) => EXIT_NOT_FOUND,
        _ => EXIT_FAILED,
    }
}

#[cfg(feature = "cli")]
fn print_text_report(cli: &Cli, result: &Result<ConversionSummary>, processing_time: Duration) {
    match result {
        Ok(summary) => {
            if cli.verbose {
                eprintln!(
                    "Processed {} lines, {} bytes -> {} bytes in {:?}",
                    summary.lines, summary.bytes_read, summary.bytes_written, processing_time
                );
                eprintln!("✓ Conversion completed successfully");
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if exit_code_for(err) == EXIT_USAGE {
                eprintln!();
                eprintln!("{}", Cli::command().render_usage());
            }
        }
    }
}

#[cfg(feature = "cli")]
fn print_json_report(cli: &Cli, result: &Result<ConversionSummary>, processing_time: Duration) {
    let Some(input) = cli.files.first() else {
        return;
    };
    let report = ConversionReport {
        success: result.is_ok(),
        input: input.as_path(),
        output: destination(cli),
        summary: result.as_ref().ok(),
        error: result.as_ref().err().map(|err| format!("{:#}", err)),
        processing_time_ms: processing_time.as_millis() as u64,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("Error: failed to render report: {}", err),
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Vec<String> {
        normalize_legacy_args(args.iter().map(OsString::from))
            .into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_legacy_args(args.iter().map(OsString::from))).unwrap()
    }

    #[test]
    fn test_normalize_legacy_flags() {
        assert_eq!(
            normalize(&["convert-text", "-OUTPUT", "Unicode", "-Replace", "in.txt"]),
            ["convert-text", "--output", "Unicode", "--replace", "in.txt"]
        );
        assert_eq!(
            normalize(&["convert-text", "--Input", "utf8", "-v", "-inputcp", "1252"]),
            ["convert-text", "--input", "utf8", "-v", "--inputcp", "1252"]
        );
    }

    #[test]
    fn test_normalize_leaves_values_and_files() {
        assert_eq!(
            normalize(&["convert-text", "-output", "ANSI", "a-b.txt", "--", "-odd"]),
            ["convert-text", "--output", "ANSI", "a-b.txt", "--", "-odd"]
        );
        // Program name is never rewritten
        assert_eq!(normalize(&["-prog"]), ["-prog"]);
    }

    #[test]
    fn test_parse_legacy_command_line() {
        let cli = parse(&[
            "convert-text",
            "-output",
            "ANSI",
            "-OUTPUTLAN",
            "jpn",
            "-NoBom",
            "in.txt",
            "out.txt",
        ]);
        assert_eq!(cli.output, "ANSI");
        assert_eq!(cli.outputlan.as_deref(), Some("jpn"));
        assert!(cli.nobom);
        assert_eq!(cli.files, [PathBuf::from("in.txt"), PathBuf::from("out.txt")]);
        assert_eq!(cli.nativecp, 1252);
    }

    #[test]
    fn test_non_numeric_codepage_rejected() {
        let err = Cli::try_parse_from(normalize_legacy_args(
            ["convert-text", "-output", "ANSI", "-outputcp", "abc", "a", "b"]
                .iter()
                .map(OsString::from),
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_job_paths() {
        let cli = parse(&["convert-text", "-output", "UTF8", "-replace", "doc.txt"]);
        let (input, output) = job_paths(&cli).unwrap();
        assert_eq!(input, PathBuf::from("doc.txt"));
        assert_eq!(output, PathBuf::from("doc.txt.convertwork"));
        assert_eq!(destination(&cli), Some(Path::new("doc.txt")));

        let cli = parse(&["convert-text", "-output", "UTF8", "doc.txt"]);
        let err = job_paths(&cli).unwrap_err();
        assert_eq!(exit_code_for(&err), EXIT_USAGE);
    }

    #[test]
    fn test_exit_codes() {
        let config = anyhow::Error::new(ConfigError::ConflictingCodepage).context("Invalid input");
        assert_eq!(exit_code_for(&config), EXIT_USAGE);

        let missing = anyhow::Error::new(ConversionError::FileNotFound {
            path: PathBuf::from("x"),
        })
        .context("Error converting file x");
        assert_eq!(exit_code_for(&missing), EXIT_NOT_FOUND);

        let unmappable = anyhow::Error::new(ConversionError::Unmappable {
            line: 1,
            character: '日',
            encoding: "windows-1252",
        });
        assert_eq!(exit_code_for(&unmappable), EXIT_FAILED);
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}

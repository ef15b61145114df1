//! Tape Transcoder CLI
//!
//! Command-line tool for recovering programs from obfuscated tape images,
//! building cartridge ROMs from them, and converting MSX charset text.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tape_transcoder::formatter::{HumanFormatter, JsonFormatter, SegmentFormatter, ShortFormatter};
use tape_transcoder::{
    build_rom_file, charset, extract_file, CodecOptions, ControlPolicy, ExtractOptions,
    LoaderFamily, OutputFile, SegmentReport,
};
use tracing::debug;

/// Obfuscated tape image transcoder.
///
/// Recovers payloads and load names from NONTAMA (PC-6001 mkII) and
/// M loader (MSX) tapes, and writes them as BLOAD, CAS or ROM images.
#[derive(Parser, Debug)]
#[command(name = "tape-transcode")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode every segment of tape images into BLOAD files
    Extract {
        /// Tape image(s) to decode
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Loader family
        #[arg(short, long, default_value = "auto")]
        loader: LoaderArg,

        /// Directory to write outputs to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Also write cassette-wrapped BLOAD files
        #[arg(long)]
        cas: bool,

        /// Report format
        #[arg(short, long, default_value = "human")]
        format: OutputFormat,

        /// Control bytes kept raw when decoding load names
        #[arg(long, default_value = "minimal")]
        preserve: PreserveArg,
    },

    /// Build paged cartridge ROMs from extracted BLOAD files
    Rom {
        /// BLOAD file(s) named `*_XXXX_YYYY_ZZZZ.bin`
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory to write outputs to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Convert between MSX charset bytes and Unicode text
    Text {
        #[command(subcommand)]
        command: TextCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TextCommand {
    /// Decode an MSX charset file to UTF-8 on stdout
    Decode {
        /// File holding MSX charset bytes
        file: PathBuf,

        /// Control bytes kept raw
        #[arg(long, default_value = "minimal")]
        preserve: PreserveArg,
    },

    /// Encode text into MSX charset bytes
    Encode {
        /// Text to encode
        text: String,

        /// Require exact table coverage (no normalization fallback)
        #[arg(long)]
        strict: bool,

        /// Write bytes to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Loader family options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoaderArg {
    /// Detect from the image markers
    Auto,
    /// NONTAMA loader (PC-6001 mkII)
    Nontama,
    /// M loader (MSX)
    Mload,
}

impl LoaderArg {
    fn family(self) -> Option<LoaderFamily> {
        match self {
            LoaderArg::Auto => None,
            LoaderArg::Nontama => Some(LoaderFamily::Nontama),
            LoaderArg::Mload => Some(LoaderFamily::MLoader),
        }
    }
}

/// Control preservation options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PreserveArg {
    /// Decode every byte through the table
    None,
    /// Keep NUL, CR, LF, SUB and DEL
    Minimal,
    /// Keep all ASCII control bytes
    Full,
}

impl From<PreserveArg> for ControlPolicy {
    fn from(arg: PreserveArg) -> Self {
        match arg {
            PreserveArg::None => ControlPolicy::None,
            PreserveArg::Minimal => ControlPolicy::Minimal,
            PreserveArg::Full => ControlPolicy::FullAscii,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact single-line output
    Short,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging if verbose
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("tape_transcoder=debug,tape_transcode=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    let success = match &args.command {
        Command::Extract {
            files,
            loader,
            out_dir,
            cas,
            format,
            preserve,
        } => {
            let mut options = ExtractOptions::new();
            options.family = loader.family();
            options.cassette = *cas;
            options.codec = CodecOptions::new().preserving((*preserve).into());
            let formatter = formatter_for(*format, &args);
            for_each_file(files, args.quiet, |path| {
                extract_one(path, &options, out_dir, formatter.as_ref(), args.quiet)
            })
        }
        Command::Rom { files, out_dir } => for_each_file(files, args.quiet, |path| {
            let rom = build_rom_file(path)?;
            write_outputs(out_dir, std::slice::from_ref(&rom), args.quiet)?;
            if !args.quiet {
                println!("generated {}", rom.name);
            }
            Ok(())
        }),
        Command::Text { command } => match run_text(command) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Error: {e:#}");
                false
            }
        },
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn formatter_for(format: OutputFormat, args: &Args) -> Box<dyn SegmentFormatter> {
    match format {
        OutputFormat::Human if args.quiet => Box::new(HumanFormatter::quiet()),
        OutputFormat::Human if args.verbose => Box::new(HumanFormatter::verbose()),
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Short => Box::new(ShortFormatter::new()),
    }
}

/// Run `f` on every file, reporting failures; true if all succeeded.
fn for_each_file(files: &[PathBuf], quiet: bool, mut f: impl FnMut(&Path) -> Result<()>) -> bool {
    let mut success = true;
    for path in files {
        if let Err(e) = f(path) {
            if !quiet {
                eprintln!("Error processing {}: {e:#}", path.display());
            }
            success = false;
        }
    }
    success
}

fn extract_one(
    path: &Path,
    options: &ExtractOptions,
    out_dir: &Path,
    formatter: &dyn SegmentFormatter,
    quiet: bool,
) -> Result<()> {
    let extracted = extract_file(path, options)
        .with_context(|| format!("decoding {}", path.display()))?;

    let mut reports: Vec<SegmentReport> = Vec::with_capacity(extracted.len());
    for segment in extracted {
        write_outputs(out_dir, &segment.files, quiet)?;
        reports.push(segment.report);
    }

    print!("{}", formatter.format_image(&reports, path));
    Ok(())
}

/// Write output files into `dir`, replacing any stale file of the same name.
fn write_outputs(dir: &Path, files: &[OutputFile], quiet: bool) -> Result<()> {
    for file in files {
        let path = dir.join(&file.name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("removing old {}", path.display()))?;
            if !quiet {
                eprintln!("Removed old {}", path.display());
            }
        }
        std::fs::write(&path, &file.data)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(path = %path.display(), len = file.data.len(), "wrote output");
    }
    Ok(())
}

fn run_text(command: &TextCommand) -> Result<()> {
    match command {
        TextCommand::Decode { file, preserve } => {
            let bytes =
                std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            let options = CodecOptions::new().preserving((*preserve).into());
            let text = charset::decode(&bytes, &options)?;
            print!("{text}");
        }
        TextCommand::Encode {
            text,
            strict,
            output,
        } => {
            let options = if *strict {
                CodecOptions::strict()
            } else {
                CodecOptions::new()
            };
            let bytes = charset::encode(text, &options)?;
            match output {
                Some(path) => std::fs::write(path, &bytes)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["tape-transcode", "extract", "tape.cas"]).unwrap();
        assert!(!args.verbose);
        match args.command {
            Command::Extract {
                files, loader, cas, ..
            } => {
                assert_eq!(files.len(), 1);
                assert!(matches!(loader, LoaderArg::Auto));
                assert!(!cas);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_extract_options() {
        let args = Args::try_parse_from([
            "tape-transcode",
            "-v",
            "extract",
            "--loader",
            "mload",
            "--cas",
            "-f",
            "json",
            "a.cas",
            "b.cas",
        ])
        .unwrap();
        assert!(args.verbose);
        match args.command {
            Command::Extract {
                files,
                loader,
                cas,
                format,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(loader.family(), Some(LoaderFamily::MLoader));
                assert!(cas);
                assert!(matches!(format, OutputFormat::Json));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_text_commands() {
        let args =
            Args::try_parse_from(["tape-transcode", "text", "encode", "--strict", "ｹﾞｰﾑ"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Text {
                command: TextCommand::Encode { strict: true, .. }
            }
        ));

        let args = Args::try_parse_from([
            "tape-transcode",
            "text",
            "decode",
            "--preserve",
            "full",
            "name.bin",
        ])
        .unwrap();
        match args.command {
            Command::Text {
                command: TextCommand::Decode { preserve, .. },
            } => assert_eq!(ControlPolicy::from(preserve), ControlPolicy::FullAscii),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_files_required() {
        assert!(Args::try_parse_from(["tape-transcode", "extract"]).is_err());
        assert!(Args::try_parse_from(["tape-transcode", "rom"]).is_err());
    }

    #[test]
    fn test_write_outputs_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("hero_8000_8002_8000.bin");
        std::fs::write(&stale, b"old contents").unwrap();

        let files = [OutputFile {
            name: "hero_8000_8002_8000.bin".to_string(),
            data: vec![0xFE, 0x00, 0x80, 0x02, 0x80, 0x00, 0x80, 0x41, 0x42],
        }];
        write_outputs(dir.path(), &files, true).unwrap();
        assert_eq!(std::fs::read(&stale).unwrap(), files[0].data);
    }

    #[test]
    fn test_write_outputs_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let files = [OutputFile {
            name: "x.bin".to_string(),
            data: vec![1],
        }];
        let err = write_outputs(&dir.path().join("absent"), &files, true).unwrap_err();
        assert!(format!("{err:#}").contains("writing"));
    }
}

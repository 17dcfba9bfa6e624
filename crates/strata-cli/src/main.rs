//! Demo consumers for the strata protocol stack.
//!
//! `strata cat` copies a plain file to standard output through a leaf
//! handle; `strata tapecat` does the same for a tape-image wrapped file,
//! writing only the payload. Both are consumers of the library surface,
//! useful for eyeballing framed files and as minimal integration examples.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use strata::{FileSource, Handle, ReadStatus, StrataError, TapeImage};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", version, about = "Read framed well-log files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy a file to standard output through a leaf handle.
    Cat {
        /// File to copy.
        path: PathBuf,
    },
    /// Copy the payload of a tape-image wrapped file to standard output.
    Tapecat {
        /// Tape-image file to unwrap.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Cat { path } => open(&path).and_then(drain_to_stdout),
        Command::Tapecat { path } => open(&path)
            .map(TapeImage::open)
            .and_then(drain_to_stdout),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("strata: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

fn open(path: &Path) -> Result<FileSource, StrataError> {
    let file = File::open(path)?;
    Ok(FileSource::open(file))
}

fn drain_to_stdout(mut handle: impl Handle) -> Result<(), StrataError> {
    let mut stdout = std::io::stdout().lock();
    let mut buf = [0u8; 1024];
    loop {
        let result = handle.read(&mut buf);
        let (n, status) = match result {
            Ok(ok) => ok,
            Err(err) => {
                // The handle-side message is the more precise one when it
                // is there.
                if let Some(msg) = handle.error_message() {
                    eprintln!("strata: {msg}");
                }
                handle.close()?;
                return Err(err);
            }
        };

        stdout.write_all(&buf[..n])?;

        match status {
            ReadStatus::Eof => {
                handle.close()?;
                return Ok(());
            }
            ReadStatus::Full | ReadStatus::Incomplete | ReadStatus::TryRecovery => {}
        }
    }
}

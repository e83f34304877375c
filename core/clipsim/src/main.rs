//! clipsim: clipboard history for X11.
//!
//! `clipsim -d` runs the daemon in the foreground. Every other flag sends one
//! command to a running daemon over the FIFOs in `/tmp/clipsim` (or
//! `$CLIPSIM_FIFO_DIR`) and prints the response.
//!
//! PRINT output is NUL-separated (`NNN preview\0`), ready for `fzf --read0`
//! or `dmenu`-style pickers.

mod client;
mod logging;
mod preview;

use std::io::Write;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use clipsim_core::Config;
use clipsim_protocol::{parse_info, FifoPaths, InfoResponse};

use client::{Client, ClientError};

#[derive(Parser, Debug)]
#[command(name = "clipsim")]
#[command(about = "Clipboard history daemon and client for X11")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["print", "info", "copy", "exclude", "save", "daemon"])
))]
struct Cli {
    /// Print the history, newest first
    #[arg(short, long)]
    print: bool,

    /// Show the full content of entry ID
    #[arg(short, long, value_name = "ID", allow_negative_numbers = true)]
    info: Option<i32>,

    /// Copy entry ID back to the clipboard
    #[arg(short, long, value_name = "ID", allow_negative_numbers = true)]
    copy: Option<i32>,

    /// Remove entry ID from the history
    #[arg(short = 'x', long, value_name = "ID", allow_negative_numbers = true)]
    exclude: Option<i32>,

    /// Save the history to disk
    #[arg(short, long)]
    save: bool,

    /// Run the daemon in the foreground
    #[arg(short, long)]
    daemon: bool,
}

/// What the user asked for, after clap has enforced that exactly one flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Print,
    Info(i32),
    Copy(i32),
    Remove(i32),
    Save,
    Daemon,
}

impl Cli {
    fn action(&self) -> Action {
        if let Some(id) = self.info {
            Action::Info(id)
        } else if let Some(id) = self.copy {
            Action::Copy(id)
        } else if let Some(id) = self.exclude {
            Action::Remove(id)
        } else if self.save {
            Action::Save
        } else if self.daemon {
            Action::Daemon
        } else {
            Action::Print
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // Help and version go to stdout with success; usage errors to stderr.
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let action = cli.action();
    let mode = if action == Action::Daemon {
        logging::Mode::Daemon
    } else {
        logging::Mode::Client
    };
    let _logging_guard = logging::init(mode);

    match run(action) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("clipsim: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_daemon() -> ExitCode {
    let config = Config::resolve();
    if let Err(err) = clipsim_daemon::run(config) {
        tracing::error!(error = %err, "clipsim daemon failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(action: Action) -> Result<ExitCode, ClientError> {
    if action == Action::Daemon {
        return Ok(run_daemon());
    }

    let client = Client::new(FifoPaths::from_env());
    let mut stdout = std::io::stdout().lock();

    match action {
        Action::Print => {
            let listing = client.print()?;
            write_stdout(&mut stdout, &listing)?;
        }
        Action::Info(id) => {
            let response = client.info(id)?;
            if response.is_empty() {
                eprintln!("clipsim: invalid index {id}");
                return Ok(ExitCode::FAILURE);
            }
            match parse_info(&response)? {
                InfoResponse::Text(text) => write_stdout(&mut stdout, text)?,
                InfoResponse::Image(path) => {
                    let previewer = Config::resolve().image_previewer;
                    let status = preview::run(&previewer, &path).map_err(|source| {
                        ClientError::Io {
                            context: "launch image previewer",
                            source,
                        }
                    })?;
                    if !status.success() {
                        tracing::warn!(status = %status, previewer = %previewer, "Image previewer failed");
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
        }
        Action::Copy(id) => client.copy(id)?,
        Action::Remove(id) => client.remove(id)?,
        Action::Save => {
            if client.save()? {
                println!("History saved");
            } else {
                eprintln!("clipsim: failed to save history");
                return Ok(ExitCode::FAILURE);
            }
        }
        Action::Daemon => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn write_stdout(stdout: &mut impl Write, bytes: &[u8]) -> Result<(), ClientError> {
    let to_error = |source| ClientError::Io {
        context: "write stdout",
        source,
    };
    stdout.write_all(bytes).map_err(to_error)?;
    stdout.flush().map_err(to_error)
}

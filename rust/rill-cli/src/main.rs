//! Rill CLI — interactive REPL and script runner.

mod repl;

use clap::{Parser as ClapParser, Subcommand};
use rill_compiler::{parse_program, Phrase};
use rill_rt::ProgState;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}
fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

#[derive(ClapParser)]
#[command(
    name = "rill",
    version,
    about = "The Rill programming language — functional, concurrent, channel-first",
    long_about = "Rill is a small functional language with synchronous rendezvous\n\
                  channels, cooperative tasks, and catchable exceptions.\n\n\
                  With no subcommand, an interactive session is started."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (the default)
    Repl,
    /// Run a script, printing each phrase's result
    Run {
        /// Path to the script
        file: PathBuf,
    },
    /// Parse a script without running it
    Parse {
        /// Path to the script
        file: PathBuf,

        /// Emit the parsed phrases as JSON
        #[arg(long)]
        emit_ast: bool,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        None | Some(Commands::Repl) => {
            repl::run();
            ExitCode::SUCCESS
        }
        Some(Commands::Run { file }) => run_file(&file),
        Some(Commands::Parse { file, emit_ast }) => parse_file(&file, emit_ast),
    }
}

fn load(path: &Path) -> Result<Vec<Phrase>, ExitCode> {
    let source = fs::read_to_string(path).map_err(|err| {
        eprintln!("{} cannot read {}: {}", red("error:"), path.display(), err);
        ExitCode::FAILURE
    })?;
    parse_program(&source).map_err(|err| {
        eprintln!("{} {}", red("parse error:"), err);
        ExitCode::FAILURE
    })
}

fn run_file(path: &Path) -> ExitCode {
    let phrases = match load(path) {
        Ok(phrases) => phrases,
        Err(code) => return code,
    };
    log::debug!("running {} phrase(s) from {}", phrases.len(), path.display());
    let mut state = ProgState::new();
    for phrase in &phrases {
        match rill_rt::obey(phrase, &state) {
            Ok((shown, next)) => {
                match phrase {
                    Phrase::Define(_) => println!("{}", gray(&shown)),
                    Phrase::Calculate(_) => println!("{}", shown),
                }
                state = next;
            }
            Err(err) => {
                eprintln!("{} {}", red("runtime error:"), err);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn parse_file(path: &Path, emit_ast: bool) -> ExitCode {
    let phrases = match load(path) {
        Ok(phrases) => phrases,
        Err(code) => return code,
    };
    if emit_ast {
        match serde_json::to_string_pretty(&phrases) {
            Ok(json) => println!("{}", json),
            Err(err) => {
                eprintln!("{} {}", red("error:"), err);
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", gray(&format!("parsed {} phrase(s)", phrases.len())));
    }
    ExitCode::SUCCESS
}

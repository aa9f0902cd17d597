//! `dotfile` command-line entry point.
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory as _, Parser as _};
use dotfile_engine::cli::{Cli, Command};
use dotfile_engine::commands;
use dotfile_engine::exec::Cancellation;
use dotfile_engine::logging::{self, Log as _, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    match &args.command {
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "dotfile", &mut std::io::stdout());
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            let version = option_env!("DOTFILE_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
            writeln!(std::io::stdout(), "dotfile {version}").ok();
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    logging::init_subscriber(args.verbose, args.command.name());
    let log = Arc::new(Logger::new(args.command.name()));

    let cancel = Cancellation::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        log.warn(&format!("cannot install interrupt handler: {e}"));
    }

    let result = match &args.command {
        Command::Run(opts) => commands::run::run(&args.global, opts, &log, &cancel),
        Command::Check(opts) => commands::check::run(&args.global, opts, &log, &cancel),
        Command::List(opts) => commands::list::run(&args.global, opts, log.as_ref()).map(|()| 0),
        Command::Completions { .. } | Command::Version => Ok(0),
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

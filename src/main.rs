//! punktf command-line entry point.

use std::io::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context as _, Result};
use clap::Parser as _;

use punktf::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match args.command {
        cli::Command::Deploy(opts) => {
            logging::init_subscriber(args.verbose, "deploy");
            let log = Arc::new(logging::Logger::new("deploy"));

            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || {
                handler_flag.store(true, Ordering::SeqCst);
            })
            .context("failed to set Ctrl+C handler")?;

            commands::deploy::run(&args.global, &opts, &log, cancel)
        }
        cli::Command::Version => {
            writeln!(std::io::stdout(), "punktf {}", commands::version())
                .context("failed to write version")
        }
    }
}

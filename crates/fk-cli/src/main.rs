//! fkplan CLI - foreign-key cycle detection and mutation planning

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::common::ExitCode;
use commands::{cycles, plan, validate};

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        match err.downcast_ref::<ExitCode>() {
            Some(code) => std::process::exit(code.0),
            None => {
                eprintln!("Error: {err:#}");
                std::process::exit(1);
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        cli::Commands::Plan(args) => plan::execute(args, &cli.global),
        cli::Commands::Cycles(args) => cycles::execute(args, &cli.global),
        cli::Commands::Validate(args) => validate::execute(args, &cli.global),
    }
}

mod cli;
mod error;
mod filters;
mod fmt;
mod importer;
mod models;
mod policy;
mod reports;
mod session;
mod settings;
mod sheet;
mod tui;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging() {
    let filter = EnvFilter::try_from_env("DESCONTOS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sheets { file } => cli::sheets::run(&file),
        Commands::Report {
            source,
            filter,
            limit,
            output,
        } => cli::report::run(&source, &filter, limit, &output),
        Commands::Policy {
            source,
            filter,
            output,
        } => cli::report::policy(&source, &filter, &output),
        Commands::Options {
            source,
            sector,
            responsible,
            json,
        } => cli::options::run(&source, sector, responsible, json),
        Commands::Dashboard { source } => cli::dashboard::run(&source),
        Commands::Config { command } => cli::config::run(command),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "descontos", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

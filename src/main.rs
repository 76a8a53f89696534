mod cli;
mod commands;
mod config;
mod engine;
mod progress;
mod registry;
mod resource;
mod settings;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use settings::Overrides;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// `--config` as given
    pub config: Option<String>,
    /// `--state` as given
    pub state: Option<String>,
    pub overrides: Overrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        overrides: Overrides {
            base_url: cli.connection.base_url,
            username: cli.connection.username,
            password: cli.connection.password,
        },
    };

    match cli.command {
        Command::Validate => commands::validate::run(&ctx),
        Command::Plan(args) => commands::plan::run(&ctx, args.target.as_deref()),
        Command::Apply(args) => commands::apply::run(&ctx, args.target.as_deref(), args.yes, args.jobs),
        Command::Destroy(args) => commands::destroy::run(&ctx, args.target.as_deref(), args.yes),
        Command::Import { address, id } => commands::import::run(&ctx, &address, &id),
        Command::Show { kind, id } => commands::show::run(&ctx, &kind, &id),
        Command::State(cmd) => commands::state::run(&ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "smilecdr-config", &mut io::stdout());
            Ok(())
        }
    }
}

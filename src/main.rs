//! MARC catalog editor CLI.

use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::Parser;
use marc_catalog::logging::{init_logging, LogConfig, LogFormat};
use marc_catalog::{CatalogConfig, RecoveryMode};

mod cli;
mod commands;

use crate::cli::{Cli, Command, LogFormatArg};

fn main() {
    let cli = Cli::parse();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        },
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = catalog_config_from_cli(&cli)?;
    match cli.command {
        Command::Init => commands::run_init(&config),
        Command::Import { file } => commands::run_import(&config, &file),
        Command::Export { file, ids } => commands::run_export(&config, &file, &ids),
        Command::List { csv } => commands::run_list(&config, csv),
        Command::Show { id, json } => commands::run_show(&config, id, json),
        Command::Replace(args) => commands::run_replace(&config, args),
        Command::Rebuild { id } => commands::run_rebuild(&config, id),
        Command::Delete { id } => commands::run_delete(&config, id),
        Command::Clear { reset } => commands::run_clear(&config, reset),
    }
}

/// Config file first, then command-line overrides.
fn catalog_config_from_cli(cli: &Cli) -> anyhow::Result<CatalogConfig> {
    let mut config = match &cli.config {
        Some(path) => CatalogConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CatalogConfig::default(),
    };
    if let Some(database) = &cli.database {
        config = config.with_database(database);
    }
    if cli.strict {
        config = config.with_recovery_mode(RecoveryMode::Strict);
    }
    Ok(config)
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(cli.log_file.is_none() && io::stderr().is_terminal())
        .with_log_file(cli.log_file.clone())
}

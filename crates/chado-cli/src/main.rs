//! chado CLI - main entry point

use chado_cli::{Cli, Commands, DeleteCommand, InsertCommand};
use chado_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use chado_engine::admin::NewOrganism;
use clap::Parser;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    // Environment files are optional; ignore a missing .env.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag, letting the environment
    // override either choice.
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("chado")
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("chado")
            .build()
    };
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // The CLI still works if logging cannot be initialized.
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> chado_cli::Result<()> {
    match &cli.command {
        Commands::Check => chado_cli::commands::check::run(&cli.config).await,
        Commands::Import {
            table,
            input,
            delimiter,
        } => chado_cli::commands::import::run(&cli.config, table, input, *delimiter).await,
        Commands::Export {
            template,
            param,
            output,
            delimiter,
            no_header,
        } => {
            chado_cli::commands::export::run(
                &cli.config,
                template,
                param,
                output,
                *delimiter,
                *no_header,
            )
            .await
        },
        Commands::Query {
            template,
            param,
            limit,
            offset,
        } => chado_cli::commands::query::run(&cli.config, template, param, *limit, *offset).await,
        Commands::Insert { entity } => match entity {
            InsertCommand::Organism {
                genus,
                species,
                abbreviation,
                common_name,
                infraspecific_name,
                comment,
            } => {
                let organism = NewOrganism {
                    genus: genus.clone(),
                    species: species.clone(),
                    abbreviation: abbreviation.clone(),
                    common_name: common_name.clone(),
                    infraspecific_name: infraspecific_name.clone(),
                    comment: comment.clone(),
                };
                chado_cli::commands::organism::insert(&cli.config, organism).await
            },
        },
        Commands::Delete { entity } => match entity {
            DeleteCommand::Organism { organism } => {
                chado_cli::commands::organism::delete(&cli.config, organism).await
            },
        },
    }
}

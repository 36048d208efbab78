//! chado-tools CLI library
//!
//! Command-line surface for administering CHADO databases:
//!
//! - **Schema checking**: validate a live database against the supported
//!   revisions (`chado check`)
//! - **Import**: bulk-load delimited files into a table (`chado import`)
//! - **Export**: stream a pre-compiled query to delimited text
//!   (`chado export`)
//! - **Query**: run a pre-compiled query and display the result
//!   (`chado query`)
//! - **Direct edits**: insert or delete single organisms
//!   (`chado insert organism`, `chado delete organism`)

pub mod commands;
pub mod error;
pub mod params;

pub use error::{CliError, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chado-tools - CHADO database administration
#[derive(Parser, Debug)]
#[command(name = "chado")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// YAML file containing connection details (host, port, database,
    /// user, password); falls back to CHADO_DATABASE_URL
    #[arg(short, long, global = true, env = "CHADO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the database schema against the supported CHADO revisions
    Check,

    /// Import a delimited file into a table
    Import {
        /// Target table name
        table: String,

        /// Input file (tab-separated with a header row)
        #[arg(short, long)]
        input: PathBuf,

        /// Field delimiter
        #[arg(short, long, default_value = "\t")]
        delimiter: char,
    },

    /// Run a pre-compiled query and export the result as delimited text
    Export {
        /// Query template name
        template: String,

        /// Template parameters as name=value pairs
        #[arg(short, long)]
        param: Vec<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Field delimiter
        #[arg(short, long, default_value = "\t")]
        delimiter: char,

        /// Suppress the header row
        #[arg(long)]
        no_header: bool,
    },

    /// Run a pre-compiled query and display the result
    Query {
        /// Query template name
        template: String,

        /// Template parameters as name=value pairs
        #[arg(short, long)]
        param: Vec<String>,

        /// Maximum number of rows
        #[arg(short, long, default_value_t = 50)]
        limit: i64,

        /// Number of rows to skip
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Insert a new entity into the database
    Insert {
        #[command(subcommand)]
        entity: InsertCommand,
    },

    /// Delete an entity from the database
    Delete {
        #[command(subcommand)]
        entity: DeleteCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum InsertCommand {
    /// Insert an organism
    Organism {
        /// Genus, e.g. "Drosophila"
        #[arg(short, long)]
        genus: String,

        /// Species, e.g. "melanogaster"
        #[arg(short, long)]
        species: String,

        /// Abbreviation, e.g. "Dmel"
        #[arg(short, long)]
        abbreviation: Option<String>,

        /// Common name, e.g. "fruit fly"
        #[arg(long)]
        common_name: Option<String>,

        /// Infraspecific name (strain, subspecies)
        #[arg(long)]
        infraspecific_name: Option<String>,

        /// Free-text comment
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeleteCommand {
    /// Delete an organism and its dependent rows
    Organism {
        /// Abbreviation or "Genus species"
        organism: String,
    },
}

//! CLI argument definitions for the catalog editor.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "marc-catalog",
    version,
    about = "Edit MARC bibliographic records in a SQLite catalog",
    long_about = "Import ISO 2709 MARC files into a relational catalog, list and inspect\n\
                  records, apply filtered find-and-replace, and export them again."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Catalog database file (overrides the config file).
    #[arg(long, short = 'd', value_name = "PATH", env = "MARC_CATALOG_DB", global = true)]
    pub database: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Reject malformed records on import instead of recovering.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the catalog tables if they do not exist.
    Init,

    /// Import every record of an ISO 2709 file.
    Import {
        /// MARC file to read.
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Export records to an ISO 2709 file.
    Export {
        /// MARC file to write.
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Export only these record ids (repeatable); all records by default.
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<i64>,
    },

    /// List records with their summary columns.
    List {
        /// Write CSV instead of a text table.
        #[arg(long)]
        csv: bool,
    },

    /// Show one record.
    Show {
        /// Record id.
        id: i64,

        /// Print the record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Find and replace text in subfield data.
    Replace(ReplaceArgs),

    /// Recompute summary columns for one record or the whole catalog.
    Rebuild {
        /// Only this record.
        #[arg(long, value_name = "ID")]
        id: Option<i64>,
    },

    /// Delete a record with its fields and subfields.
    Delete {
        /// Record id.
        id: i64,
    },

    /// Delete every record.
    Clear {
        /// Drop and recreate the tables so ids start again from 1.
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Args)]
pub struct ReplaceArgs {
    /// Text to search for.
    #[arg(long, value_name = "TEXT")]
    pub find: String,

    /// Replacement text.
    #[arg(long = "with", value_name = "TEXT")]
    pub replacement: String,

    /// Only fields with this tag (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Only fields with this first indicator (repeatable).
    #[arg(long = "ind1", value_name = "CHAR")]
    pub indicator1: Vec<char>,

    /// Only fields with this second indicator (repeatable).
    #[arg(long = "ind2", value_name = "CHAR")]
    pub indicator2: Vec<char>,

    /// Only subfields with this code (repeatable).
    #[arg(long = "code", value_name = "CHAR")]
    pub codes: Vec<char>,

    /// Match case-insensitively; replaces the first match per subfield.
    #[arg(long = "ignore-case", short = 'i')]
    pub ignore_case: bool,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

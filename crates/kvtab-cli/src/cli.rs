use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kvtab_sdk::{KeyMode, RunMode};

#[derive(Parser)]
#[command(
    name = "kvtab",
    about = "Logical databases, tables and rows over key-value hashes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store configuration file.
    #[arg(short, long, global = true, default_value = "kvtab.toml")]
    pub config: PathBuf,

    /// Shard endpoint; repeat for more shards. Replaces the config file.
    #[arg(short, long = "endpoint", global = true)]
    pub endpoints: Vec<String>,

    /// Run mode override.
    #[arg(long, global = true)]
    pub mode: Option<RunMode>,

    /// Row key mode override.
    #[arg(long, global = true)]
    pub key_mode: Option<KeyMode>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a table (and its database)
    CreateTable(TableArgs),
    /// Drop a table with all of its rows
    DropTable(TableArgs),
    /// Drop a database with all of its tables
    DropDatabase(DatabaseArgs),
    /// Delete every row of a table
    Truncate(TableArgs),
    /// Delete one row
    Delete(RowArgs),
    /// Write columns that do not exist yet
    Insert(WriteArgs),
    /// Overwrite or delete columns
    Update(UpdateArgs),
    /// Show one row
    Get(RowArgs),
    /// Show every row of a table
    Rows(TableArgs),
    /// List the tables of a database
    Tables(DatabaseArgs),
    /// Show the remaining lifetime of a row
    Ttl(RowArgs),
    /// Check every shard and update its health
    Ping,
}

#[derive(Args)]
pub struct DatabaseArgs {
    pub database: String,
}

#[derive(Args)]
pub struct TableArgs {
    pub database: String,
    pub table: String,
}

#[derive(Args)]
pub struct RowArgs {
    pub database: String,
    pub table: String,
    pub id: String,
}

#[derive(Args)]
pub struct WriteArgs {
    #[command(flatten)]
    pub row: RowArgs,
    /// `field=value` pairs.
    #[arg(required = true, value_parser = parse_assignment)]
    pub fields: Vec<(String, String)>,
}

#[derive(Args)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub row: RowArgs,
    /// `field=value` pairs.
    #[arg(value_parser = parse_assignment)]
    pub fields: Vec<(String, String)>,
    /// Column to delete; repeatable.
    #[arg(long)]
    pub unset: Vec<String>,
    /// Expire the row this many seconds after the write.
    #[arg(long)]
    pub expire: Option<u64>,
}

/// Split `field=value` at the first `=`.
pub fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, _)) if field.is_empty() => Err(format!("missing field name in {s:?}")),
        Some((field, value)) => Ok((field.to_string(), value.to_string())),
        None => Err(format!("expected field=value, got {s:?}")),
    }
}

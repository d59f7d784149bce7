use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch new requests, search the catalog and report matches.
    Run(RunArgs),
    Cursor {
        #[command(subcommand)]
        command: CursorCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Append matches to this CSV file (skipped when absent).
    #[arg(long)]
    pub out: Option<String>,

    /// Reprocess requests newer than this id instead of the stored cursor.
    #[arg(long)]
    pub since: Option<u64>,

    /// Maximum listing pages to fetch.
    #[arg(long, default_value_t = 50)]
    pub max_pages: usize,
}

#[derive(Debug, Subcommand)]
pub enum CursorCommand {
    /// Print the stored cursor.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Store a tracker session token (the `mam_id` cookie value).
    Set(SessionSetArgs),
}

#[derive(Debug, Args)]
pub struct SessionSetArgs {
    pub mam_id: String,
}

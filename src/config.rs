use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Default storage directory, relative to the working directory.
pub const DEFAULT_RECORDS_DIR: &str = "records";

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Parser, Debug)]
#[command(author, version, about = "Stores student profile submissions as CSV records", long_about = None)]
pub struct Args {
    /// Directory holding the record files
    #[arg(long, global = true, env = "PROFILE_RECORDS_DIR", default_value = DEFAULT_RECORDS_DIR)]
    pub records_dir: PathBuf,

    /// Address the HTTP service listens on
    #[arg(long, global = true, env = "PROFILE_RECORDS_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Create an empty record file for a stream, year and session
    Init(InitArgs),
}

#[derive(ClapArgs, Debug)]
pub struct InitArgs {
    #[arg(long)]
    pub stream: String,
    #[arg(long)]
    pub year: String,
    #[arg(long)]
    pub session: String,
}

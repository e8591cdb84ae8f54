use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "harvestrelay")]
#[command(about = "Time-boxed harvests that continue themselves", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $HARVESTRELAY_CONFIG or config/harvestrelay.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the worker server
    Serve(ServeArgs),
    /// Run one top-level invocation and print its result
    Invoke(InvokeArgs),
    /// Print the ledger record of a chain
    Chain(ChainArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (overrides server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct InvokeArgs {
    /// Invocation payload file, or `-` for stdin
    #[arg(long)]
    pub payload: String,

    /// Run every continuation inside this call
    #[arg(long)]
    pub in_process: bool,
}

#[derive(clap::Args, Debug)]
pub struct ChainArgs {
    pub chain_id: Uuid,
}

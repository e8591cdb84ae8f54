mod cli;

use clap::Parser;
use cli::{ChainArgs, Cli, Commands, InvokeArgs, ServeArgs};
use harvestrelay::bootstrap::Runtime;
use harvestrelay::config::Config;
use harvestrelay::dispatch::DispatchMode;
use harvestrelay::ledger::ChainLedger;
use harvestrelay::server::{self, AppState};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    // Logs go to stderr so `invoke` and `chain` output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load_with(cli.config)?;

    match cli.command {
        Commands::Serve(args) => serve(config, args).await?,
        Commands::Invoke(args) => invoke(config, args).await?,
        Commands::Chain(args) => chain(config, args)?,
    }

    Ok(())
}

async fn serve(config: Config, args: ServeArgs) -> Result<(), AnyError> {
    let runtime = Runtime::build(&config, None)?;
    let state = AppState::new(
        &runtime,
        config.server.max_payload_bytes,
        config.dispatch.auth_token.clone(),
    );

    let address = args.address.unwrap_or(config.server.bind_addr);
    server::run(address, state).await?;

    runtime.shutdown().await?;
    Ok(())
}

async fn invoke(config: Config, args: InvokeArgs) -> Result<(), AnyError> {
    let payload = if args.payload == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin().read_to_end(&mut buf).await?;
        buf
    } else {
        tokio::fs::read(&args.payload).await?
    };

    let mode = args.in_process.then_some(DispatchMode::InProcess);
    let runtime = Runtime::build(&config, mode)?;

    let result = runtime.entry.handle_bytes(&payload).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    let chain_id = result.outcome.chain_id();
    let ledger = runtime.ledger.clone();
    runtime.shutdown().await?;

    if let (Some(chain_id), Some(ledger)) = (chain_id, ledger) {
        if let Some(record) = ledger.get(&chain_id)? {
            info!(%chain_id, state = ?record.state, links = record.links, "Chain settled");
        }
    }

    Ok(())
}

fn chain(config: Config, args: ChainArgs) -> Result<(), AnyError> {
    let ledger = ChainLedger::open(&config.ledger.path)?;
    match ledger.history(&args.chain_id)? {
        Some(history) => {
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
        None => Err(format!("chain {} not found", args.chain_id).into()),
    }
}

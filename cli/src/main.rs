use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dao_governance::{DaoClient, DaoConfig};
use dao_wallet::ConnectorKind;
use tracing_subscriber::EnvFilter;

mod gov;
mod parse_utils;

use gov::GovCmd;

#[derive(Parser)]
#[command(name = "dao")]
#[command(about = "DAO membership and governance client")]
struct Cli {
    /// Config file (defaults to ~/.dao/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Wallet connector to use
    #[arg(long, global = true, default_value = "injected")]
    connector: ConnectorKind,
    #[command(subcommand)]
    cmd: GovCmd,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match DaoConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}");
            return ExitCode::from(2);
        }
    };
    let client = match DaoClient::from_config(&config) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    client.connect(cli.connector).await;
    if !matches!(cli.cmd, GovCmd::Status) {
        if let Err(err) = gov::check_view(&client.view()) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }
    match gov::handle(&client, cli.cmd).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dao_governance::{DaoClient, DaoConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod html;
mod routes;

#[derive(Parser)]
#[command(name = "dao-ui")]
#[command(about = "Serve the DAO member page locally")]
struct Args {
    /// Config file (defaults to ~/.dao/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = match DaoConfig::load(args.config.as_deref())
        .map_err(Into::into)
        .and_then(|config| DaoClient::from_config(&config))
    {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };
    let watcher = client.watch_wallet();
    info!(listen = %args.listen, "serving member page");
    warp::serve(routes::routes(client)).run(args.listen).await;
    watcher.abort();
    ExitCode::SUCCESS
}

//! Light-wallet server daemon.
//!
//! Scans nothing itself: it serves the account store the chain scanner
//! populates, authenticating thin clients by view key.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lws_db::Storage;
use lws_rest::{parse_bind, router, AppState, HandlerState};
use lws_rpc::{DaemonClient, DaemonConfig, RateSource, RATES_INTERVAL};
use lws_types::Network;

/// View-key light-wallet server.
#[derive(Parser)]
#[command(name = "lws-server")]
#[command(about = "Serves view-key scanned wallet data to thin clients")]
#[command(version)]
struct Cli {
    /// Network the store was scanned against.
    #[arg(long, default_value = "mainnet")]
    network: Network,

    /// Path to the account database.
    #[arg(long, default_value = "lws.redb")]
    db_path: PathBuf,

    /// REST listen address, http://host[:port] (port defaults to 8080).
    #[arg(long, default_value = "http://0.0.0.0:8080")]
    rest_bind: String,

    /// Upstream daemon RPC URL.
    #[arg(long, default_value = "http://127.0.0.1:18081")]
    daemon: String,

    /// Worker threads for the request pool.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Exchange-rate JSON endpoint; omit to disable rates.
    #[arg(long)]
    rates_url: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (host, port) = parse_bind(&cli.rest_bind)?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

    let disk = Storage::open(&cli.db_path)?;
    let client = DaemonClient::new(DaemonConfig {
        url: cli.daemon.clone(),
        send_timeout: Duration::from_secs(10),
        receive_timeout_cap: None,
    })?;
    let rates = RateSource::new(cli.rates_url.clone(), RATES_INTERVAL);

    let state = HandlerState { disk, client, rates, network: cli.network };
    let app = router(AppState::new(state));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cli.threads.max(1))
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
        info!(
            "listening on {} with {} worker threads, daemon at {}",
            listener.local_addr()?,
            cli.threads.max(1),
            cli.daemon
        );
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    })
}

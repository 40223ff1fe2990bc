//! Main entrypoint
//! Opens the bus, primes the state store, and serves the JSON API until interrupted
use std::path::PathBuf;

use anyhow::{Context, Result};
use cecbridge::{
    config::{Backend, Config},
    logging::transport_logging,
    transport::Openable,
    CecBridge,
};
use clap::Parser;
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

mod http;

/// The global application instance.
static APP: OnceCell<App> = OnceCell::new();

pub struct App {
    bridge: CecBridge,

    /// Cancelled when the daemon is shutting down
    shutdown: CancellationToken,
}

#[derive(Clone, Debug, Parser)]
#[clap(version=env!("CARGO_PKG_VERSION"), author=env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// Path to the configuration file, created with defaults if missing
    #[clap(
        long,
        short,
        env = "CECBRIDGE_CONFIG",
        default_value = "/etc/cecbridge/config.toml"
    )]
    config: PathBuf,

    /// Verbosity level. -v display decoded frames -vv also display polls and raw lines
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log bus traffic to a file
    #[clap(long, env = "CECBRIDGE_LOG")]
    log: Option<PathBuf>,

    /// Use a simulated bus instead of cec-client
    #[clap(long)]
    mock: bool,

    /// Address the HTTP server binds to, overrides the configuration file
    #[clap(long)]
    bind_address: Option<String>,
}

fn bind_address(opts: &Opts, config: &Config) -> String {
    if let Some(addr) = &opts.bind_address {
        return addr.clone();
    }
    if let Ok(port) = std::env::var("PORT") {
        return format!("0.0.0.0:{}", port);
    }
    config
        .http_server
        .as_ref()
        .and_then(|s| s.bind_address.clone())
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let mut config = Config::load(&opts.config)
        .with_context(|| format!("loading config file {}", opts.config.display()))?;
    if opts.mock {
        config.bus.backend = Backend::Mock;
    }
    let bind = bind_address(&opts, &config);

    let transport = config.bus.open().await?;
    let transport = transport_logging(transport, opts.verbose, opts.log.clone());

    let bridge = CecBridge::new(transport, config);
    if let Err(e) = bridge.start().await {
        log::warn!("couldn't prime device status: {}", e);
    }

    let shutdown = CancellationToken::new();
    if APP
        .set(App {
            bridge,
            shutdown: shutdown.clone(),
        })
        .is_err()
    {
        anyhow::bail!("application initialized twice");
    }

    let result = http::main(bind, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("couldn't listen for ctrl-c: {}", e);
            futures::future::pending::<()>().await;
        }
        log::info!("shutting down");
        shutdown.cancel();
    })
    .await;

    if let Some(app) = APP.get() {
        app.shutdown.cancel();
        app.bridge.stop().await?;
    }
    result
}

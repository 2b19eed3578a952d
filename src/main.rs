//! deflux - deCONZ sensor events to time series records
//!
//! `deflux run` follows the gateway's event feed and prints one JSON record per
//! sensor state change on stdout. Logs go to stderr.

use clap::{Parser, Subcommand};
use deflux::{
    client::{DeconzHttpClient, WebSocketTransport, DEFAULT_DEVICE_TYPE},
    discovery::discover_gateways,
    error::ErrorReporter,
    events::{EventStream, StateDecoder},
    logging::{init_logging, LogConfig},
    DefluxConfig, DefluxError, Result, SensorDirectory, SensorEvent, SensorEventPump,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Time allowed for the pump to wind down after Ctrl-C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// deflux command line
#[derive(Parser, Debug)]
#[command(name = "deflux")]
#[command(about = "Stream deCONZ sensor events as time series records")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to ./deflux.toml or /etc/deflux.toml)
    #[arg(long, short, global = true, env = "DEFLUX_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow the event feed and print records (default)
    Run,
    /// List gateways announced to the discovery service
    Discover,
    /// Request an API key, the gateway must be unlocked first
    Pair {
        /// Gateway REST address, e.g. http://192.168.1.90:8080/api
        #[arg(long)]
        addr: Option<Url>,
    },
    /// Print a configuration, discovering and pairing when possible
    DefaultConfig {
        /// Skip discovery and pairing
        #[arg(long)]
        offline: bool,
    },
}

impl Cli {
    /// Initialize logging based on configuration and debug flag
    fn initialize_logging(&self, config: &DefluxConfig) -> Result<()> {
        let mut log_config = LogConfig::from_settings(&config.logging).with_env_overrides();
        if self.debug {
            log_config.directives = "debug".to_string();
        }
        init_logging(log_config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Some(Command::DefaultConfig { .. }) => DefluxConfig::default(),
        _ => DefluxConfig::load(cli.config.as_deref())?,
    };
    cli.initialize_logging(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Discover => discover(&config).await,
        Command::Pair { addr } => pair(&config, addr).await,
        Command::DefaultConfig { offline } => default_config(config, offline).await,
    }
}

async fn run(config: DefluxConfig) -> Result<()> {
    config.validate()?;

    let rest = Arc::new(DeconzHttpClient::new(&config.deconz)?);
    let directory = Arc::new(SensorDirectory::new(rest.clone()));

    let websocket_addr = match &config.deconz.websocket_addr {
        Some(addr) => addr.clone(),
        None => rest.websocket_address().await?,
    };

    let stream = EventStream::new(
        websocket_addr,
        Arc::new(WebSocketTransport::new(config.deconz.timeout)),
        StateDecoder::new(directory.clone()),
    );

    let (tx, mut rx) = mpsc::channel(config.pump.channel_capacity);
    let mut pump = SensorEventPump::new(config.pump.reconnection.clone())
        .with_sensor_lookup(directory)
        .with_event_source(Box::new(stream));
    pump.start(tx)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(event) => print_record(&event),
                None => {
                    warn!("Event channel closed");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    pump.stop();
    match tokio::time::timeout(SHUTDOWN_GRACE, pump.shutdown()).await {
        Ok(result) => result?,
        Err(_) => warn!("Pump did not stop within {SHUTDOWN_GRACE:?}, exiting anyway"),
    }

    let stats = pump.stats().await;
    info!(
        published = stats.events_published,
        dropped = stats.events_dropped,
        connection_losses = stats.connection_losses,
        "Finished"
    );
    Ok(())
}

fn print_record(event: &SensorEvent) {
    match event.timeseries() {
        Ok(ts) => {
            let record = serde_json::json!({
                "measurement": "deflux",
                "time": chrono::Utc::now().to_rfc3339(),
                "tags": ts.tags,
                "fields": ts.fields,
            });
            println!("{record}");
        }
        Err(DefluxError::NoTimeseries) => {
            debug!(sensor_id = event.sensor.id, "Event without time series data");
        }
        Err(e) => ErrorReporter::log_error(&e, "cli", "timeseries"),
    }
}

async fn discover(config: &DefluxConfig) -> Result<()> {
    let gateways =
        discover_gateways(&config.deconz.discovery_endpoint, config.deconz.timeout).await?;

    for gateway in gateways {
        let api = gateway
            .api_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|e| e.to_string());
        println!("{}\t{}\t{}", gateway.name, gateway.mac_address, api);
    }
    Ok(())
}

async fn pair(config: &DefluxConfig, addr: Option<Url>) -> Result<()> {
    let addr = addr.unwrap_or_else(|| config.deconz.addr.clone());
    let client = DeconzHttpClient::with_timeout(addr, String::new(), config.deconz.timeout)?;
    let key = client.pair(DEFAULT_DEVICE_TYPE).await?;
    println!("{key}");
    Ok(())
}

async fn default_config(mut config: DefluxConfig, offline: bool) -> Result<()> {
    if !offline {
        match discover_gateways(&config.deconz.discovery_endpoint, config.deconz.timeout).await {
            Ok(gateways) => {
                // first gateway wins when several are announced
                if let Some(api) = gateways.first().and_then(|g| g.api_url().ok()) {
                    info!(addr = %api, "Using discovered gateway");
                    config.deconz.addr = api;
                }
            }
            Err(e) => warn!("Discovery failed, fill in deconz.addr manually: {e}"),
        }

        let client = DeconzHttpClient::with_timeout(
            config.deconz.addr.clone(),
            String::new(),
            config.deconz.timeout,
        )?;
        match client.pair(DEFAULT_DEVICE_TYPE).await {
            Ok(key) => config.deconz.api_key = key,
            Err(e) => warn!("Pairing failed, fill in deconz.api_key manually: {e}"),
        }
    }

    info!("Save this configuration to ./deflux.toml or /etc/deflux.toml");
    print!("{}", config.to_toml()?);
    Ok(())
}

//! API Mock State Engine - CLI Entry Point

use anyhow::{Context, Result};
use apimock_state::{ClientId, IncomingRequest, MockServer, MockServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "apimock-state",
    about = "Per-client mock state engine - validate catalogs and dry-run mock responses",
    version
)]
struct Args {
    /// Path to configuration file or mocks directory
    #[arg(short, long, default_value = "apimock.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Client id used for the dry run
    #[arg(long, default_value = "cli")]
    client: String,

    /// Select a scenario before the dry run (MOCK=SCENARIO)
    #[arg(long = "scenario", value_name = "MOCK=SCENARIO")]
    scenarios: Vec<String>,

    /// Bind a client variable before the dry run (NAME=VALUE)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    vars: Vec<String>,

    /// Request to dry-run, e.g. "GET /greet"
    #[arg(long, value_name = "METHOD URL")]
    request: Option<String>,
}

fn split_pair<'a>(value: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    value
        .split_once('=')
        .with_context(|| format!("Invalid {} '{}', expected NAME=VALUE", what, value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::load(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no mocks)");
        MockServerConfig::default()
    };

    let server = MockServer::new(config).context("Invalid mock catalog")?;

    if args.validate {
        println!(
            "Configuration is valid ({} mocks defined)",
            server.catalog().len()
        );
        return Ok(());
    }

    let client = ClientId::new(args.client);

    for pair in &args.scenarios {
        let (mock, scenario) = split_pair(pair, "scenario")?;
        server
            .set_scenario(&client, mock, scenario)
            .map_err(|e| anyhow::anyhow!("{}: {}", e.kind(), e))?;
    }
    for pair in &args.vars {
        let (name, value) = split_pair(pair, "variable")?;
        server.set_variable(Some(&client), name, value);
    }

    match args.request {
        Some(request) => {
            let (method, url) = request
                .trim()
                .split_once(char::is_whitespace)
                .with_context(|| format!("Invalid request '{}', expected \"METHOD URL\"", request))?;
            let request = IncomingRequest::new(method, url.trim());

            match server.handle(&request, &client).await? {
                Some(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                None => anyhow::bail!("No mock matches {} {}", request.method, request.url),
            }
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&server.list_mocks(&client))?);
        }
    }

    Ok(())
}

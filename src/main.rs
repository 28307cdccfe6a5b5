//! openapi-mock-middleware - CLI Entry Point
//!
//! Validates declarative mock files and dispatches single requests through
//! them without touching the network.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use openapi_mock_middleware::{
    json_response, BoxError, Client, HttpMethod, MockConfig, MockMiddleware, Params, Request,
    Response, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "openapi-mock-middleware",
    about = "Validate declarative HTTP mocks and dispatch requests through them",
    version
)]
struct Args {
    /// Path to the mock definitions
    #[arg(short, long, default_value = "mocks.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Request to dispatch, e.g. "GET /pet/{petId}"
    #[arg(short, long, value_name = "METHOD TEMPLATE")]
    request: Option<String>,

    /// Path parameter as name=value (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,
}

/// Answers every request that reaches it with 502; nothing leaves the process.
struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn send(&self, request: Request) -> Result<Response, BoxError> {
        let message = format!(
            "no mock for {} {} and no upstream configured",
            request.method(),
            request.uri().path()
        );
        let body = serde_json::json!({ "error": "pass_through", "message": message });
        Ok(json_response(502, &body)?)
    }
}

fn parse_request(input: &str) -> Result<(HttpMethod, String)> {
    let (method, template) = input
        .trim()
        .split_once(char::is_whitespace)
        .with_context(|| format!("expected \"METHOD TEMPLATE\", got {:?}", input))?;
    Ok((method.parse()?, template.trim().to_string()))
}

fn parse_params(raw: &[String]) -> Result<Params> {
    raw.iter().try_fold(Params::new(), |params, pair| -> Result<Params> {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("expected NAME=VALUE, got {:?}", pair))?;
        // Numbers and booleans keep their JSON type, everything else is a string
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        Ok(params.with_path(name, value))
    })
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
        print!("{}", include_str!("../config/default-mocks.yaml"));
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockConfig::from_file(&args.config)?
    } else if args.validate || args.request.is_some() {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no mocks)");
        MockConfig::default()
    };

    let middleware = Arc::new(MockMiddleware::from_config(config));

    if args.validate {
        let shadowed = middleware.registry().shadowed();
        for dup in &shadowed {
            println!(
                "warning: mock #{} ({} {}) is unreachable, shadowed by mock #{}",
                dup.index, dup.method, dup.path, dup.shadowed_by
            );
        }
        println!(
            "Configuration is valid ({} mocks defined, {} unreachable)",
            middleware.registry().len(),
            shadowed.len()
        );
        return Ok(());
    }

    let Some(input) = args.request.as_deref() else {
        for mock in middleware.registry().iter() {
            println!("{:<8} {}", mock.method(), mock.path());
        }
        return Ok(());
    };

    let (method, template) = parse_request(input)?;
    let params = parse_params(&args.params)?;
    let body: Option<serde_json::Value> = args
        .body
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--body is not valid JSON")?;

    let mut client = Client::new("http://mock.invalid", OfflineTransport);
    client.use_middleware(Arc::clone(&middleware));

    let response = client.request(method, &template, params, body.as_ref()).await?;
    println!("{}", response.status());
    for (name, value) in response.headers() {
        println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
    }
    if !response.body().is_empty() {
        println!();
        println!("{}", String::from_utf8_lossy(response.body()));
    }

    Ok(())
}

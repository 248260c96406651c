// ABOUTME: Entry point for the remotehttp CLI application.
// ABOUTME: Opens the tunnel, sends one query, prints the result, and closes the tunnel.

mod cli;

use clap::Parser;
use cli::Cli;
use remotehttp::error::{Error, Result};
use remotehttp::output;
use remotehttp::request::query_url;
use remotehttp::ssh::{Environment, TunnelConfig, TunnelHandle};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(body) => println!("{body}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let env = Environment::from_process();
    let user = cli
        .user
        .or_else(|| env.user.clone())
        .ok_or_else(|| Error::MissingEnvVar("USER".to_string()))?;

    let mut config = TunnelConfig::new(cli.host, user)
        .with_environment(&env)
        .port(cli.ssh_port)
        .target_port(cli.port);
    config = if cli.no_timeout {
        config.request_timeout(None)
    } else {
        config.request_timeout(Some(Duration::from_secs(cli.timeout)))
    };
    if cli.insecure_accept_any_host {
        config = config.insecure_accept_any_host();
    }

    let mut tunnel = TunnelHandle::connect(&config).await?;
    let result = tunnel.get(&query_url(&cli.path, &cli.query)).await;
    tunnel.close().await;

    output::render(&result?)
}

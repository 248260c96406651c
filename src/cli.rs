// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Names the remote host, the tunneled port, and the query to send.

use clap::Parser;
use remotehttp::request::DEFAULT_QUERY_PATH;

#[derive(Parser)]
#[command(name = "remotehttp")]
#[command(about = "Query an HTTP service bound to loopback on a remote host, over SSH")]
#[command(version)]
#[command(
    after_help = "Host and user are taken as given; ~/.ssh/config (Hostname, User) is not consulted."
)]
pub struct Cli {
    /// Query sent as the `query` parameter
    pub query: String,

    /// Remote host to connect to over SSH
    #[arg(long)]
    pub host: String,

    /// SSH user (defaults to $USER, then the login name of the current uid)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Loopback port of the HTTP service on the remote host
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// SSH port on the remote host
    #[arg(long, default_value_t = 22)]
    pub ssh_port: u16,

    /// Request path on the remote service
    #[arg(long, default_value = DEFAULT_QUERY_PATH)]
    pub path: String,

    /// Accept any host key without checking known_hosts (insecure)
    #[arg(long)]
    pub insecure_accept_any_host: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60, conflicts_with = "no_timeout")]
    pub timeout: u64,

    /// Wait for the response without a time limit
    #[arg(long)]
    pub no_timeout: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

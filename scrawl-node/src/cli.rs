//! Command-line argument parsing.

use std::net::SocketAddr;

use clap::Parser;

/// Scrawl replicated log node.
#[derive(Parser, Debug, Clone)]
#[command(name = "scrawl-node")]
#[command(about = "Scrawl replicated log node binary")]
#[command(version)]
pub struct Cli {
    /// Replication listen address.
    #[arg(long, default_value = "0.0.0.0:7401")]
    pub listen: SocketAddr,

    /// Self-advertised url used for peer announcement and self-connection
    /// suppression. Defaults to 127.0.0.1:<listen port>.
    #[arg(long)]
    pub self_url: Option<String>,

    /// Comma-separated list of bootstrap peer urls.
    #[arg(long, value_delimiter = ',')]
    pub peers: Option<Vec<String>>,

    /// RPC listen address.
    #[arg(long, default_value = "127.0.0.1:7402")]
    pub rpc_listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The self-advertised url, derived from the listen port if not given.
    pub fn self_url(&self) -> String {
        self.self_url
            .clone()
            .unwrap_or_else(|| format!("127.0.0.1:{}", self.listen.port()))
    }
}

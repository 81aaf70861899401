use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use quottery_sync_core::{EngineConfig, NodeConfig, WireLayout};

/// Mirrors Quottery contract state from a Qubic node into a local SQLite cache.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Node to poll: an `http(s)://` RPC gateway or `tcp://host[:port]`.
    #[arg(long, default_value = "https://rpc.qubic.org", env = "QTRY_NODE")]
    pub node: String,

    /// Date layout of the node's records (`packed` or `legacy`).
    /// Defaults to what the connection scheme implies.
    #[arg(long)]
    pub layout: Option<WireLayout>,

    /// Directory holding the cache file.
    #[arg(long, default_value = ".", env = "QTRY_DB_PATH")]
    pub db_path: PathBuf,

    /// Seconds between reconciliation cycles.
    #[arg(long, default_value = "3")]
    pub interval_secs: u64,

    /// Maximum concurrent bet-info requests.
    #[arg(long, default_value = "4")]
    pub rpc_concurrency: usize,

    /// Outbound request rate limit for the HTTP gateway.
    #[arg(long)]
    pub requests_per_second: Option<u32>,

    /// Do not refresh per-option participant lists.
    #[arg(long)]
    pub skip_option_details: bool,
}

impl Cli {
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            connection: self.node.clone(),
            layout: self.layout,
            requests_per_second: self.requests_per_second,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            rpc_concurrency: self.rpc_concurrency.max(1),
            refresh_option_details: !self.skip_option_details,
        }
    }
}

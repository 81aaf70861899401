use reqwest::Url;

use crate::codec::WireLayout;
use crate::error::CoreError;

/// Default port of a node's direct TCP binding.
pub const DEFAULT_TCP_PORT: u16 = 21841;

/// Where the node lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Base URL of the HTTP RPC gateway, without a trailing slash.
    Http { base: String, host: String, port: u16 },
    /// Direct binding to the node's peer port.
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Layout the endpoint speaks unless configuration overrides it.
    pub fn default_layout(&self) -> WireLayout {
        match self {
            Self::Http { .. } => WireLayout::Packed,
            Self::Tcp { .. } => WireLayout::Legacy,
        }
    }

    pub fn address(&self) -> NodeAddress {
        match self {
            Self::Http { host, port, .. } | Self::Tcp { host, port } => NodeAddress {
                host: host.clone(),
                port: *port,
            },
        }
    }
}

/// `(host, port)` identifying the node in the basic-info table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

pub(super) fn parse_connection(connection: &str) -> Result<Endpoint, CoreError> {
    let parsed = Url::parse(connection).map_err(|e| {
        CoreError::Config(format!(
            "invalid node connection `{connection}`: expected http(s):// or tcp:// URL ({e})"
        ))
    })?;
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| CoreError::Config(format!("node connection `{connection}` has no host")))?
        .to_owned();

    match parsed.scheme() {
        "http" | "https" => {
            let port = parsed.port_or_known_default().unwrap_or(443);
            Ok(Endpoint::Http {
                base: connection.trim_end_matches('/').to_owned(),
                host,
                port,
            })
        }
        "tcp" => Ok(Endpoint::Tcp {
            host,
            port: parsed.port().unwrap_or(DEFAULT_TCP_PORT),
        }),
        other => Err(CoreError::Config(format!(
            "unsupported connection scheme `{other}`; expected http, https or tcp"
        ))),
    }
}

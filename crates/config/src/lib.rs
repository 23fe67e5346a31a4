//! Configuration tree for the rover workers.
//!
//! Deserialized from a toml file by the binary; values here are plain data,
//! loading and override plumbing live with the caller.

use serde::{Deserialize, Serialize};

/// Which foreign network flavor the rovers attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Main,
    Test,
}

/// Top-level config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub eth: EthConfig,
    #[serde(default)]
    pub lsk: LskConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Process-level settings shared by every rover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Mainnet vs testnet selection for the foreign chains.
    #[serde(default)]
    pub network: Network,
    /// Run without a parent coordinator: validate and log, emit nothing.
    #[serde(default)]
    pub standalone: bool,
    /// Websocket url of the parent coordinator RPC.
    #[serde(default = "default_parent_url")]
    pub parent_url: String,
}

fn default_parent_url() -> String {
    "ws://127.0.0.1:3000".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            standalone: false,
            parent_url: default_parent_url(),
        }
    }
}

/// Ethereum rover settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthConfig {
    /// Target peer count before the startup jitter is applied.
    #[serde(default = "default_maximum_peers")]
    pub maximum_peers: u32,
    /// Extra boot nodes (enode urls) tried alongside the chain defaults.
    #[serde(default)]
    pub alt_boot_nodes: Vec<String>,
    /// Designated-wallet identity for "emb" marking; absent disables it.
    #[serde(default)]
    pub designated_wallet: Option<String>,
}

fn default_maximum_peers() -> u32 {
    25
}

impl Default for EthConfig {
    fn default() -> Self {
        Self {
            maximum_peers: default_maximum_peers(),
            alt_boot_nodes: Vec::new(),
            designated_wallet: None,
        }
    }
}

/// Lisk rover settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LskConfig {
    /// Rotate between api nodes instead of always using the first.
    #[serde(default = "default_true")]
    pub randomize_nodes: bool,
    /// Api nodes never to contact.
    #[serde(default)]
    pub banned_peers: Vec<String>,
    /// Api node base urls; chain defaults are used when empty.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Designated-wallet public key for "emb" marking; absent disables it.
    #[serde(default)]
    pub designated_wallet: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for LskConfig {
    fn default() -> Self {
        Self {
            randomize_nodes: true,
            banned_peers: Vec::new(),
            nodes: Vec::new(),
            designated_wallet: None,
        }
    }
}

/// Logging settings consumed by the binary's tracing init.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Extra label appended to the service name in log output.
    pub service_label: Option<String>,
    /// Emit json lines instead of the human-readable format.
    #[serde(default)]
    pub json_format: bool,
    /// Directive string overriding `RUST_LOG` when set.
    pub filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.client.network, Network::Main);
        assert!(!config.client.standalone);
        assert_eq!(config.eth.maximum_peers, 25);
        assert!(config.lsk.randomize_nodes);
        assert!(config.eth.designated_wallet.is_none());
    }

    #[test]
    fn partial_sections_fill_in() {
        let raw = r#"
            [client]
            network = "test"
            standalone = true

            [eth]
            maximum_peers = 10
            designated_wallet = "0x1f9090aae28b8a3dceadf281b0f12828e676c326"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.client.network, Network::Test);
        assert!(config.client.standalone);
        assert_eq!(config.eth.maximum_peers, 10);
        assert!(config.eth.designated_wallet.is_some());
        // untouched section keeps defaults
        assert!(config.lsk.banned_peers.is_empty());
    }
}

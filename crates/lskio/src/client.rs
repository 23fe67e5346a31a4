//! Http client for the Lisk node REST api.

use async_trait::async_trait;
use rand::Rng;
use rover_config::{LskConfig, Network};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::{LskBlock, LskTransaction};

/// The api caps listing pages at this size.
pub(crate) const PAGE_LIMIT: u64 = 100;

const MAINNET_NODES: &[&str] = &[
    "https://node01.lisk.io",
    "https://node02.lisk.io",
    "https://node03.lisk.io",
];

const TESTNET_NODES: &[&str] = &["https://testnet.lisk.io"];

#[derive(Debug, Error)]
pub enum LskClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("every api node is banned or unconfigured")]
    NoUsableNodes,

    #[error("api answered with an empty listing")]
    EmptyListing,
}

/// What the driver needs from a Lisk node.
#[async_trait]
pub trait LskApi: Send + Sync + 'static {
    /// Newest block on the remote chain.
    async fn latest_block(&self) -> Result<LskBlock, LskClientError>;

    /// One listing page, newest first. `offset` 0 is the tip.
    async fn blocks(&self, limit: u64, offset: u64) -> Result<Vec<LskBlock>, LskClientError>;

    /// Transactions contained in one block.
    async fn transactions(&self, block_id: &str) -> Result<Vec<LskTransaction>, LskClientError>;
}

/// The listing envelope changed shape across node versions; both are
/// accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlocksEnvelope {
    Modern { data: Vec<LskBlock> },
    Legacy { blocks: Vec<LskBlock> },
}

impl BlocksEnvelope {
    fn into_blocks(self) -> Vec<LskBlock> {
        match self {
            BlocksEnvelope::Modern { data } => data,
            BlocksEnvelope::Legacy { blocks } => blocks,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TransactionsEnvelope {
    #[serde(default)]
    data: Vec<LskTransaction>,
}

/// Concrete client over `reqwest`, rotating across configured nodes.
#[derive(Debug)]
pub struct LskApiClient {
    http: reqwest::Client,
    nodes: Vec<String>,
    randomize: bool,
}

impl LskApiClient {
    pub fn new(config: &LskConfig, network: Network) -> Result<Self, LskClientError> {
        let defaults = match network {
            Network::Main => MAINNET_NODES,
            Network::Test => TESTNET_NODES,
        };
        let configured: Vec<String> = if config.nodes.is_empty() {
            defaults.iter().map(|s| s.to_string()).collect()
        } else {
            config.nodes.clone()
        };
        let nodes: Vec<String> = configured
            .into_iter()
            .filter(|node| !config.banned_peers.contains(node))
            .collect();
        if nodes.is_empty() {
            return Err(LskClientError::NoUsableNodes);
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            nodes,
            randomize: config.randomize_nodes,
        })
    }

    fn pick_node(&self) -> &str {
        if self.randomize && self.nodes.len() > 1 {
            let index = rand::thread_rng().gen_range(0..self.nodes.len());
            &self.nodes[index]
        } else {
            &self.nodes[0]
        }
    }
}

#[async_trait]
impl LskApi for LskApiClient {
    async fn latest_block(&self) -> Result<LskBlock, LskClientError> {
        let mut blocks = self.blocks(1, 0).await?;
        let result = blocks.drain(..).next().ok_or(LskClientError::EmptyListing);
        result
    }

    async fn blocks(&self, limit: u64, offset: u64) -> Result<Vec<LskBlock>, LskClientError> {
        let node = self.pick_node();
        let limit = limit.min(PAGE_LIMIT);
        debug!(node, limit, offset, "listing blocks");
        let envelope: BlocksEnvelope = self
            .http
            .get(format!("{node}/api/blocks"))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.into_blocks())
    }

    async fn transactions(&self, block_id: &str) -> Result<Vec<LskTransaction>, LskClientError> {
        let node = self.pick_node();
        debug!(node, block_id, "listing transactions");
        let envelope: TransactionsEnvelope = self
            .http
            .get(format!("{node}/api/transactions"))
            .query(&[("blockId", block_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_envelope_shapes_parse() {
        let modern = r#"{"data": [{"id": "1", "height": 5, "timestamp": 10}]}"#;
        let legacy = r#"{"blocks": [{"id": "2", "height": 6, "timestamp": 20}]}"#;

        let parsed: BlocksEnvelope = serde_json::from_str(modern).unwrap();
        assert_eq!(parsed.into_blocks()[0].height, 5);

        let parsed: BlocksEnvelope = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.into_blocks()[0].height, 6);
    }

    #[test]
    fn banned_nodes_are_filtered() {
        let config = LskConfig {
            nodes: vec!["https://a".into(), "https://b".into()],
            banned_peers: vec!["https://a".into()],
            ..Default::default()
        };
        let client = LskApiClient::new(&config, Network::Main).unwrap();
        assert_eq!(client.nodes, vec!["https://b".to_string()]);
    }

    #[test]
    fn all_nodes_banned_is_an_error() {
        let config = LskConfig {
            nodes: vec!["https://a".into()],
            banned_peers: vec!["https://a".into()],
            ..Default::default()
        };
        assert!(matches!(
            LskApiClient::new(&config, Network::Main),
            Err(LskClientError::NoUsableNodes)
        ));
    }

    #[test]
    fn defaults_depend_on_network() {
        let config = LskConfig::default();
        let main = LskApiClient::new(&config, Network::Main).unwrap();
        assert_eq!(main.nodes.len(), MAINNET_NODES.len());

        let test = LskApiClient::new(&config, Network::Test).unwrap();
        assert_eq!(test.nodes, vec![TESTNET_NODES[0].to_string()]);
    }
}

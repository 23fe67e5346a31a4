//! Network identities and the fork-probe constants.

use alloy_primitives::{address, b256, Bytes, B256, B64, U256};
use rover_config::Network;

use crate::types::Header;

/// Height of the dao hard-fork block used as the chain-identity probe.
pub const DAO_FORK_HEIGHT: u64 = 1_920_000;

/// Hash of the mainnet dao hard-fork block. A peer answering the probe
/// with any other header is not on the chain we follow.
pub const DAO_FORK_HASH: B256 =
    b256!("4985f5ca3d2afbec36529aa96f74de3cc10a2a4a6c44f2157a57d2c6059a11bb");

const MAINNET_GENESIS_HASH: B256 =
    b256!("d4e56740f876aef8c010b86a40d5f56745a118d0906a34e69aec8c0db1cb8fa3");

const ROPSTEN_GENESIS_HASH: B256 =
    b256!("41941023680923e0fe4d74a34bdac8141f2540e3ae90623718e47d66d1ca4a2d");

const MAINNET_BOOT_NODES: &[&str] = &[
    "enode://d860a01f9722d78051619d1e2351aba3f43f943f6f00718d1b9baa4101932a1f5011f16bb2b1bb35db20d6fe28fa0bf09636d26a87d31de9ec6203eeedb1f666@18.138.108.67:30303",
    "enode://22a8232c3abc76a16ae9d6c3b164f98775fe226f0917b0ca871128a74a8e9630b458460865bab457221f1d448dd9791d24c4e5d88786180ac185df813a68d4de@3.209.45.79:30303",
];

const ROPSTEN_BOOT_NODES: &[&str] = &[
    "enode://30b7ab30a01c124a6cceca36863ece12c4f5fa68e3ba9b0b51407ccc002eeed3b3102d20a88f1c1d3c3154e2449317b8ef95090e77b312d5cc39354f86d5d606@52.176.7.10:30303",
    "enode://865a63255b3bb68023b6bffd5095118fcc13e79dcf014fe4e47e065c350c7cc72af2e53eff895f11ba1bbb6a2b33271c1116ee870f266618eadfc2e78aa7349c@52.176.100.77:30303",
];

/// Chain-identity probe executed against every fresh peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkProbe {
    pub height: u64,
    pub hash: B256,
}

/// Per-network parameters for the eth rover.
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub network_id: u64,
    pub genesis_hash: B256,
    pub genesis_difficulty: U256,
    /// Absent on networks without a distinguishing fork block; peers are
    /// then trusted right after the status exchange.
    pub fork_probe: Option<ForkProbe>,
    pub boot_nodes: Vec<String>,
}

impl NetworkParams {
    /// Parameters for the selected network, with configured alt boot nodes
    /// appended to the chain defaults.
    pub fn for_network(network: Network, alt_boot_nodes: &[String]) -> Self {
        let (network_id, genesis_hash, genesis_difficulty, fork_probe, defaults) = match network {
            Network::Main => (
                1,
                MAINNET_GENESIS_HASH,
                U256::from(17_179_869_184u64),
                Some(ForkProbe {
                    height: DAO_FORK_HEIGHT,
                    hash: DAO_FORK_HASH,
                }),
                MAINNET_BOOT_NODES,
            ),
            Network::Test => (
                3,
                ROPSTEN_GENESIS_HASH,
                U256::from(1_048_576u64),
                None,
                ROPSTEN_BOOT_NODES,
            ),
        };
        let mut boot_nodes: Vec<String> = defaults.iter().map(|s| s.to_string()).collect();
        boot_nodes.extend(alt_boot_nodes.iter().cloned());
        Self {
            network_id,
            genesis_hash,
            genesis_difficulty,
            fork_probe,
            boot_nodes,
        }
    }
}

/// The dao hard-fork header, kept verbatim so fork probes from other peers
/// can be answered without holding any chain state.
pub fn dao_fork_header() -> Header {
    Header {
        parent_hash: b256!("a218e2c611f21232d857e3c8cecdcdf1f65f25a4477f98f6f47e4063807f2308"),
        ommers_hash: b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"),
        beneficiary: address!("bcdfc35b86bedf72f0cda046a3c16829a2ef41d1"),
        state_root: b256!("c5e389416116e3696cce82ec4533cce33efccb24ce245ae9546a4b8f0d5e9a75"),
        transactions_root: b256!(
            "7701df8e07169452554d14aadd7bfa256d4a1d0355c1d174ab373e3e2d0a3743"
        ),
        receipts_root: b256!("26cf9d9422e9dd95aedc7914db690b92bab6902f5221d62694a2fa5d065f534b"),
        logs_bloom: Default::default(),
        difficulty: U256::from(62_413_376_722_602u64),
        number: DAO_FORK_HEIGHT,
        gas_limit: 4_712_384,
        gas_used: 84_000,
        timestamp: 1_469_020_840,
        extra_data: Bytes::from_static(b"dao-hard-fork"),
        mix_hash: b256!("5b5acbf4bf305f948bd7be176047b20623e1417f75597341a059729165b92397"),
        nonce: B64::new([0xbe, 0xde, 0x87, 0x20, 0x1d, 0xe4, 0x24, 0x26]),
    }
}

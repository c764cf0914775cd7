//! Chain id catalog.

use medvault_core::ValidationError;

/// Known chain ids and their display labels.
pub const NETWORKS: &[(u64, &str)] = &[
    (1, "Ethereum Mainnet"),
    (3, "Ropsten"),
    (4, "Rinkeby"),
    (5, "Goerli"),
    (42, "Kovan"),
    (137, "Polygon"),
    (80001, "Mumbai"),
    (1337, "Localhost"),
];

/// Chains the vault is meant to run on.
pub const SUPPORTED_NETWORKS: [u64; 5] = [1, 5, 137, 80001, 1337];

/// Human-readable label, `Chain <id>` for unknown ids.
pub fn network_name(chain_id: u64) -> String {
    NETWORKS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("Chain {chain_id}"))
}

pub fn is_supported(chain_id: u64) -> bool {
    SUPPORTED_NETWORKS.contains(&chain_id)
}

/// Parse a chain id as providers report it: `0x`-prefixed hex or decimal.
pub fn parse_chain_id(raw: &str) -> Result<u64, ValidationError> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse::<u64>(),
    };
    parsed.map_err(|_| ValidationError::InvalidChainId(raw.to_string()))
}

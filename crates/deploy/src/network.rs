//! Supported networks.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DeployError;

/// A network the contracts can be deployed to.
///
/// Exactly one network is active per orchestration run. It is chosen by the
/// caller and handed to the [`AddressRegistry`](crate::AddressRegistry), never
/// stored in process-wide state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Goerli,
    Sepolia,
    Optimism,
}

impl Network {
    /// Parse a network name, failing with [`DeployError::UnsupportedNetwork`].
    pub fn parse(name: &str) -> Result<Self, DeployError> {
        Self::from_str(name.trim()).map_err(|_| DeployError::UnsupportedNetwork(name.to_string()))
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Goerli => 5,
            Network::Sepolia => 11155111,
            Network::Optimism => 10,
        }
    }

    /// All supported networks, in declaration order.
    pub fn all() -> impl Iterator<Item = Network> {
        <Network as strum::IntoEnumIterator>::iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_networks() {
        assert_eq!(Network::parse("goerli").unwrap(), Network::Goerli);
        assert_eq!(Network::parse("Sepolia").unwrap(), Network::Sepolia);
        assert_eq!(Network::parse(" optimism ").unwrap(), Network::Optimism);
    }

    #[test]
    fn test_parse_unknown_network() {
        let err = Network::parse("mainnet").unwrap_err();
        assert_eq!(err, DeployError::UnsupportedNetwork("mainnet".to_string()));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for network in Network::all() {
            assert_eq!(Network::parse(&network.to_string()).unwrap(), network);
        }
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(Network::Goerli.chain_id(), 5);
        assert_eq!(Network::Sepolia.chain_id(), 11155111);
        assert_eq!(Network::Optimism.chain_id(), 10);
    }
}

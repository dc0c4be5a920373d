//! Static per-network address registry.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::{DeployError, Network};

/// Symbolic names of pre-existing contracts the pipeline depends on.
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
pub enum ContractSymbol {
    #[strum(to_string = "WETH", serialize = "weth")]
    #[serde(rename = "weth", alias = "WETH")]
    Weth,
    #[strum(to_string = "Votes", serialize = "votes")]
    #[serde(rename = "votes", alias = "Votes")]
    Votes,
}

impl ContractSymbol {
    pub fn all() -> impl Iterator<Item = ContractSymbol> {
        <ContractSymbol as strum::IntoEnumIterator>::iter()
    }
}

/// Look up the well-known address of `symbol` on `network`.
///
/// Total over every supported network: `None` means the contract is not
/// deployed there, which is distinct from the zero address.
pub fn resolve(symbol: ContractSymbol, network: Network) -> Option<Address> {
    match (symbol, network) {
        (ContractSymbol::Weth, Network::Goerli) => {
            Some(address!("B4FBF271143F4FBf7B91A5ded31805e42b2208d6"))
        }
        (ContractSymbol::Weth, Network::Sepolia) => {
            Some(address!("7b79995e5f793A07Bc00c21412e50Ecae098E7f9"))
        }
        (ContractSymbol::Weth, Network::Optimism) => {
            Some(address!("4200000000000000000000000000000000000006"))
        }
        (ContractSymbol::Votes, Network::Goerli) => {
            Some(address!("A237b3cC022F70B45AFdbe62EdF9C12ac36932F8"))
        }
        (ContractSymbol::Votes, Network::Sepolia) => {
            Some(address!("083b23dC187502D4f4DAc683F023D7d25E087728"))
        }
        (ContractSymbol::Votes, Network::Optimism) => None,
    }
}

/// Address registry bound to a single network for the lifetime of a run.
///
/// Binding the network at construction means every lookup made during one
/// orchestration uses the same network. Per-run overlays (from configuration)
/// take precedence over the static table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRegistry {
    network: Network,
    overlay: BTreeMap<ContractSymbol, Address>,
}

impl AddressRegistry {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            overlay: BTreeMap::new(),
        }
    }

    /// Replace the address of `symbol` for this run.
    pub fn with_overlay(mut self, symbol: ContractSymbol, address: Address) -> Self {
        self.overlay.insert(symbol, address);
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn resolve(&self, symbol: ContractSymbol) -> Option<Address> {
        self.overlay
            .get(&symbol)
            .copied()
            .or_else(|| resolve(symbol, self.network))
    }

    /// Like [`Self::resolve`], but absence is an error.
    pub fn require(&self, symbol: ContractSymbol) -> Result<Address, DeployError> {
        self.resolve(symbol).ok_or_else(|| DeployError::MissingAddress {
            symbol,
            network: self.network.to_string(),
        })
    }

    /// Every symbol with its resolution, in a stable order.
    pub fn entries(&self) -> Vec<(ContractSymbol, Option<Address>)> {
        ContractSymbol::all()
            .map(|symbol| (symbol, self.resolve(symbol)))
            .collect()
    }
}

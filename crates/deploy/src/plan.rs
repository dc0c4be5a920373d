//! Deployment specs and the address map threaded between them.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, B256, U256};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Contracts provisioned by the pipeline, in deployment order.
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
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ContractRole {
    Votes,
    Auction,
    Questions,
}

impl ContractRole {
    /// Name of the compiled contract implementing this role.
    pub fn contract_name(&self) -> &'static str {
        match self {
            ContractRole::Votes => "Votes",
            ContractRole::Auction => "Auction",
            ContractRole::Questions => "Questions",
        }
    }

    pub fn all() -> impl Iterator<Item = ContractRole> {
        <ContractRole as strum::IntoEnumIterator>::iter()
    }
}

/// A single constructor or call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Text(String),
    Word(B256),
    /// The address another role resolved to earlier in the run.
    Ref(ContractRole),
}

impl ArgValue {
    /// Replace a forward reference by the resolved address.
    pub fn resolve(
        &self,
        contract: &str,
        resolved: &ResolvedAddresses,
    ) -> Result<Self, DeployError> {
        match self {
            ArgValue::Ref(role) => resolved
                .get(role)
                .copied()
                .map(ArgValue::Address)
                .ok_or_else(|| DeployError::UnresolvedReference {
                    contract: contract.to_string(),
                    role: *role,
                }),
            other => Ok(other.clone()),
        }
    }
}

impl From<Address> for ArgValue {
    fn from(address: Address) -> Self {
        ArgValue::Address(address)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::Uint(U256::from(value))
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Text(value.to_string())
    }
}

/// Addresses resolved so far in a run, keyed by role.
///
/// Owned by the orchestrator and lent to each stage's argument binder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct ResolvedAddresses(BTreeMap<ContractRole, Address>);

impl ResolvedAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: ContractRole, address: Address) {
        self.0.insert(role, address);
    }
}

/// Where an address used by downstream stages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AddressSource {
    /// Deployed during this run.
    Deployed,
    /// Supplied explicitly by the operator.
    Override,
    /// Taken from the static address registry.
    Registry,
}

/// What to deploy for one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub role: ContractRole,
    pub contract_name: String,
    pub args: Vec<ArgValue>,
}

impl DeploymentSpec {
    pub fn new(role: ContractRole, args: Vec<ArgValue>) -> Self {
        Self {
            role,
            contract_name: role.contract_name().to_string(),
            args,
        }
    }

    /// Roles whose addresses must be resolved before this spec can be bound.
    pub fn depends_on(&self) -> Vec<ContractRole> {
        let mut roles: Vec<_> = self
            .args
            .iter()
            .filter_map(|arg| match arg {
                ArgValue::Ref(role) => Some(*role),
                _ => None,
            })
            .collect();
        roles.sort();
        roles.dedup();
        roles
    }

    /// Resolve every forward reference against `resolved`.
    pub fn bind(&self, resolved: &ResolvedAddresses) -> Result<Vec<ArgValue>, DeployError> {
        self.args
            .iter()
            .map(|arg| arg.resolve(&self.contract_name, resolved))
            .collect()
    }
}

/// Literal constructor parameters of the auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionParams {
    /// Recipient of auction proceeds.
    pub treasury: Address,
    /// Auction duration in seconds.
    pub duration: u64,
    /// Minimum accepted bid, in wei.
    pub reserve_price: u64,
    pub votes_uri: String,
    pub flash_votes_uri: String,
}

impl Default for AuctionParams {
    fn default() -> Self {
        Self {
            treasury: alloy_core::primitives::address!("a98f5FE3645aE950AB92f12E3b4322bA96DC5a22"),
            duration: 300,
            reserve_price: 10_000_000_000_000,
            votes_uri: "ipfs://QmPMc4tcBsMqLRuCQtPmPe84bpSjrC3Ky7t3JWuHXYB4aS/0".to_string(),
            flash_votes_uri: "ipfs://QmPMc4tcBsMqLRuCQtPmPe84bpSjrC3Ky7t3JWuHXYB4aS/1".to_string(),
        }
    }
}

/// `Votes` takes no constructor arguments.
pub fn votes_spec() -> DeploymentSpec {
    DeploymentSpec::new(ContractRole::Votes, vec![])
}

/// `Auction(weth, votes, treasury, duration, reservePrice, votesURI, flashVotesURI)`.
pub fn auction_spec(weth: Address, params: &AuctionParams) -> DeploymentSpec {
    DeploymentSpec::new(
        ContractRole::Auction,
        vec![
            ArgValue::Address(weth),
            ArgValue::Ref(ContractRole::Votes),
            ArgValue::Address(params.treasury),
            params.duration.into(),
            params.reserve_price.into(),
            params.votes_uri.as_str().into(),
            params.flash_votes_uri.as_str().into(),
        ],
    )
}

/// `Questions(votes)`.
pub fn questions_spec() -> DeploymentSpec {
    DeploymentSpec::new(ContractRole::Questions, vec![ArgValue::Ref(ContractRole::Votes)])
}

/// Which contracts a run deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSelection {
    pub votes: bool,
    pub auction: bool,
    pub questions: bool,
}

impl Default for StageSelection {
    fn default() -> Self {
        Self {
            votes: true,
            auction: true,
            questions: true,
        }
    }
}

impl StageSelection {
    /// Select only the given roles.
    pub fn only(roles: &[ContractRole]) -> Self {
        Self {
            votes: roles.contains(&ContractRole::Votes),
            auction: roles.contains(&ContractRole::Auction),
            questions: roles.contains(&ContractRole::Questions),
        }
    }

    pub fn includes(&self, role: ContractRole) -> bool {
        match role {
            ContractRole::Votes => self.votes,
            ContractRole::Auction => self.auction,
            ContractRole::Questions => self.questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;

    use super::*;

    const WETH: Address = address!("B4FBF271143F4FBf7B91A5ded31805e42b2208d6");

    #[test]
    fn test_auction_spec_references_votes() {
        let spec = auction_spec(WETH, &AuctionParams::default());
        assert_eq!(spec.contract_name, "Auction");
        assert_eq!(spec.args.len(), 7);
        assert_eq!(spec.depends_on(), vec![ContractRole::Votes]);
        assert_eq!(
            spec.bind(&ResolvedAddresses::new()),
            Err(DeployError::UnresolvedReference {
                contract: "Auction".to_string(),
                role: ContractRole::Votes,
            })
        );
    }

    #[test]
    fn test_votes_spec_binds_without_references() {
        assert!(votes_spec().depends_on().is_empty());
        assert_eq!(votes_spec().bind(&ResolvedAddresses::new()), Ok(vec![]));
    }

    #[test]
    fn test_bind_resolves_reference() {
        let votes = address!("00000000000000000000000000000000000000a2");
        let mut resolved = ResolvedAddresses::new();
        resolved.insert(ContractRole::Votes, votes);

        let bound = questions_spec().bind(&resolved).unwrap();
        assert_eq!(bound, vec![ArgValue::Address(votes)]);
    }

    #[test]
    fn test_bind_reports_unresolved_reference() {
        let err = questions_spec().bind(&ResolvedAddresses::new()).unwrap_err();
        assert_eq!(
            err,
            DeployError::UnresolvedReference {
                contract: "Questions".to_string(),
                role: ContractRole::Votes,
            }
        );
    }

    #[test]
    fn test_bind_keeps_literals_in_order() {
        let params = AuctionParams::default();
        let votes = address!("00000000000000000000000000000000000000a2");
        let mut resolved = ResolvedAddresses::new();
        resolved.insert(ContractRole::Votes, votes);

        let bound = auction_spec(WETH, &params).bind(&resolved).unwrap();
        assert_eq!(
            bound,
            vec![
                ArgValue::Address(WETH),
                ArgValue::Address(votes),
                ArgValue::Address(params.treasury),
                ArgValue::Uint(U256::from(300u64)),
                ArgValue::Uint(U256::from(10_000_000_000_000u128)),
                ArgValue::Text(params.votes_uri.clone()),
                ArgValue::Text(params.flash_votes_uri.clone()),
            ]
        );
    }

    #[test]
    fn test_stage_selection_only() {
        let selection = StageSelection::only(&[ContractRole::Questions]);
        assert!(!selection.includes(ContractRole::Votes));
        assert!(!selection.includes(ContractRole::Auction));
        assert!(selection.includes(ContractRole::Questions));
        assert!(StageSelection::default().includes(ContractRole::Votes));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("auction".parse::<ContractRole>().unwrap(), ContractRole::Auction);
        assert_eq!(ContractRole::Questions.to_string(), "Questions");
    }
}

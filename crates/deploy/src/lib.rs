//! quorum-deploy - Ordered deployment of the Votes, Auction and Questions contracts.
//!
//! This crate resolves network addresses, deploys the contracts in dependency
//! order, grants the auction its minting role and verifies sources on a block
//! explorer, reporting what is live on-chain after every run.

mod artifacts;
pub use artifacts::{ArtifactSet, ArtifactSource, BuildInfo, ContractFactory, HardhatArtifacts};

mod builder;
pub use builder::{OrchestratorBuilder, QuorumOrchestrator};

mod chain;
pub use chain::{ChainClient, TxReceipt};

mod config;
pub use config::{
    AddressOverlay, QUORUM_CONFIG_FILENAME, QUORUM_ENV_PREFIX, QuorumConfig, VerificationConfig,
};

mod deployer;
pub use deployer::{ContractDeployer, DeploymentResult};

mod error;
pub use error::{DeployError, OrchestrationError, VerificationError};

mod network;
pub use network::Network;

mod orchestrator;
pub use orchestrator::{MINTER_ROLE, Orchestrator, Stage, minter_role};

mod plan;
pub use plan::{
    AddressSource, ArgValue, AuctionParams, ContractRole, DeploymentSpec, ResolvedAddresses,
    StageSelection, auction_spec, questions_spec, votes_spec,
};

pub mod registry;
pub use registry::{AddressRegistry, ContractSymbol};

mod report;
pub use report::{ContractRecord, DeployStatus, DeploymentReport, PermissionGrant};

mod rpc;
pub use rpc::{RpcChainClient, RpcChainConfig, RpcError};

pub mod verify;
pub use verify::{
    EtherscanConfig, EtherscanVerifier, VerificationRequest, VerificationStatus, Verifier,
};

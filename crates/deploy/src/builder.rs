//! Builder module for creating an [`Orchestrator`] from a [`QuorumConfig`].
//!
//! Command-line overrides are applied on top of the loaded configuration before
//! the concrete collaborators (JSON-RPC client, Hardhat artifacts, Etherscan
//! verifier) are constructed.

use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use url::Url;

use crate::{
    ContractDeployer, ContractRole, EtherscanVerifier, HardhatArtifacts, Orchestrator,
    QuorumConfig, RpcChainClient, StageSelection,
};

/// Orchestrator wired to the production collaborators.
pub type QuorumOrchestrator = Orchestrator<RpcChainClient, HardhatArtifacts, EtherscanVerifier>;

/// Builder for a [`QuorumOrchestrator`].
#[derive(Debug, Clone, Default)]
pub struct OrchestratorBuilder {
    config: QuorumConfig,
}

impl OrchestratorBuilder {
    pub fn new(config: QuorumConfig) -> Self {
        Self { config }
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.config.network = network.into();
        self
    }

    pub fn rpc_url(mut self, url: Url) -> Self {
        self.config.chain.rpc_url = url;
        self
    }

    pub fn artifacts(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.artifacts = path.into();
        self
    }

    pub fn votes_override(mut self, votes: Address) -> Self {
        self.config.votes_override = Some(votes);
        self
    }

    /// Deploy only the given contracts. An empty slice keeps the configured selection.
    pub fn only(mut self, roles: &[ContractRole]) -> Self {
        if !roles.is_empty() {
            self.config.stages = StageSelection::only(roles);
        }
        self
    }

    pub fn verification_enabled(mut self, enabled: bool) -> Self {
        self.config.verification.enabled = enabled;
        self
    }

    /// The configuration the orchestrator will be built from.
    pub fn config(&self) -> &QuorumConfig {
        &self.config
    }

    /// Build the orchestrator.
    ///
    /// Fails on an unsupported network or an unusable HTTP client. Verification
    /// is disabled when turned off or when no explicit API key is configured.
    pub fn build(self) -> Result<QuorumOrchestrator> {
        let config = self.config;
        let registry = config.registry()?;
        let network = registry.network();

        let client = RpcChainClient::new(config.chain.clone())
            .context("Failed to create JSON-RPC client")?;
        let artifacts = HardhatArtifacts::new(&config.artifacts);

        let verifier = if config.verification.enabled {
            let verifier = EtherscanVerifier::from_config(
                &config.verification.etherscan,
                network.chain_id(),
                artifacts.clone(),
            )
            .context("Failed to create Etherscan client")?;
            if verifier.is_none() {
                tracing::warn!(%network, "No Etherscan API key configured, verification disabled");
            }
            verifier
        } else {
            None
        };

        tracing::info!(
            %network,
            rpc_url = %config.chain.rpc_url,
            artifacts = %config.artifacts.display(),
            verification = verifier.is_some(),
            "Orchestrator configured"
        );

        let deployer = ContractDeployer::new(client, artifacts)
            .submission_retries(config.submission_retries);

        Ok(Orchestrator::new(registry, deployer, verifier)
            .auction_params(config.auction)
            .votes_override(config.votes_override)
            .stages(config.stages))
    }
}

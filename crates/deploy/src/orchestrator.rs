//! Ordered deployment of Votes, Auction and Questions.
//!
//! Each stage awaits the previous one. Addresses flow through a
//! [`ResolvedAddresses`] map owned by the run, and every committed deployment is
//! recorded in the [`DeploymentReport`] before the next stage starts, so a
//! failure always reports what is already live.

use alloy_core::primitives::{Address, B256, keccak256};

use crate::{
    AddressRegistry, AddressSource, ArgValue, ArtifactSource, AuctionParams, ChainClient,
    ContractDeployer, ContractRole, ContractSymbol, DeployError, DeploymentReport,
    DeploymentResult, DeploymentSpec, OrchestrationError, PermissionGrant, ResolvedAddresses,
    StageSelection, VerificationRequest, VerificationStatus, Verifier, auction_spec,
    questions_spec, votes_spec,
};

/// Name of the role the auction needs on Votes to mint.
pub const MINTER_ROLE: &str = "MINTER_ROLE";

/// `keccak256("MINTER_ROLE")`, the role identifier used by `AccessControl`.
pub fn minter_role() -> B256 {
    keccak256(MINTER_ROLE)
}

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum Stage {
    Init,
    DeployVotes,
    DeployAuction,
    GrantMinterRole,
    VerifyAuction,
    DeployQuestions,
    VerifyQuestions,
    Done,
}

/// Drives one deployment run on the registry's network.
#[derive(Debug)]
pub struct Orchestrator<C, A, V> {
    registry: AddressRegistry,
    deployer: ContractDeployer<C, A>,
    verifier: Option<V>,
    auction: AuctionParams,
    votes_override: Option<Address>,
    stages: StageSelection,
}

impl<C, A, V> Orchestrator<C, A, V>
where
    C: ChainClient,
    A: ArtifactSource,
    V: Verifier,
{
    /// Verification is skipped for the whole run when `verifier` is `None`.
    pub fn new(
        registry: AddressRegistry,
        deployer: ContractDeployer<C, A>,
        verifier: Option<V>,
    ) -> Self {
        Self {
            registry,
            deployer,
            verifier,
            auction: AuctionParams::default(),
            votes_override: None,
            stages: StageSelection::default(),
        }
    }

    pub fn auction_params(mut self, params: AuctionParams) -> Self {
        self.auction = params;
        self
    }

    /// Build Auction and Questions against an existing Votes contract.
    pub fn votes_override(mut self, votes: Option<Address>) -> Self {
        self.votes_override = votes;
        self
    }

    pub fn stages(mut self, stages: StageSelection) -> Self {
        self.stages = stages;
        self
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Run every selected stage.
    ///
    /// On failure the returned error carries the report of contracts deployed
    /// before the failing stage.
    pub async fn run(&self) -> Result<DeploymentReport, OrchestrationError> {
        let network = self.registry.network();
        let mut report = DeploymentReport::new(network);
        let mut resolved = ResolvedAddresses::new();

        tracing::info!(
            %network,
            chain_id = network.chain_id(),
            votes = self.stages.votes,
            auction = self.stages.auction,
            questions = self.stages.questions,
            "Starting deployment..."
        );

        // Init: every registry address is resolved before the first transaction.
        let weth = if self.stages.auction {
            match self.registry.require(ContractSymbol::Weth) {
                Ok(weth) => Some(weth),
                Err(e) => return Err(abort(Stage::Init, ContractRole::Auction, e, report)),
            }
        } else {
            None
        };

        let needs_votes = self.stages.auction || self.stages.questions;
        let mut votes_binding = match self.votes_override {
            Some(votes) => Some((votes, AddressSource::Override)),
            None if !self.stages.votes && needs_votes => {
                match self.registry.require(ContractSymbol::Votes) {
                    Ok(votes) => Some((votes, AddressSource::Registry)),
                    Err(e) => return Err(abort(Stage::Init, ContractRole::Votes, e, report)),
                }
            }
            None => None,
        };
        if let (false, Some((votes, source))) = (self.stages.votes, votes_binding) {
            report.record_existing(ContractRole::Votes, votes, source);
        }

        if self.stages.votes {
            let votes = match self
                .deploy(Stage::DeployVotes, &votes_spec(), &resolved, &mut report)
                .await
            {
                Ok(votes) => votes,
                Err(e) => return Err(abort(Stage::DeployVotes, ContractRole::Votes, e, report)),
            };
            // Votes is not verified by the pipeline.
            report.set_verification(ContractRole::Votes, VerificationStatus::Skipped);
            if votes_binding.is_none() {
                votes_binding = Some((votes.address, AddressSource::Deployed));
            }
        }

        if let Some((votes, source)) = votes_binding {
            if source == AddressSource::Override {
                tracing::info!(%votes, "Using Votes override for downstream contracts");
            }
            resolved.insert(ContractRole::Votes, votes);
            report.votes_binding = votes_binding;
        }

        if let Some(weth) = weth {
            let spec = auction_spec(weth, &self.auction);
            let auction = match self
                .deploy(Stage::DeployAuction, &spec, &resolved, &mut report)
                .await
            {
                Ok(auction) => auction,
                Err(e) => {
                    return Err(abort(Stage::DeployAuction, ContractRole::Auction, e, report));
                }
            };
            resolved.insert(ContractRole::Auction, auction.address);

            // The grant targets the Votes instance the auction was built with.
            let votes = resolved
                .get(&ContractRole::Votes)
                .copied()
                .ok_or(DeployError::UnresolvedReference {
                    contract: ContractRole::Auction.contract_name().to_string(),
                    role: ContractRole::Votes,
                });
            let grant = match votes {
                Ok(votes) => self.grant_minter_role(votes, auction.address).await,
                Err(e) => Err(e),
            };
            match grant {
                Ok(grant) => report.set_grant(grant),
                Err(e) => return Err(abort(Stage::GrantMinterRole, ContractRole::Votes, e, report)),
            }

            let status = self.verify(Stage::VerifyAuction, &auction).await;
            report.set_verification(ContractRole::Auction, status);
        }

        if self.stages.questions {
            let questions = match self
                .deploy(Stage::DeployQuestions, &questions_spec(), &resolved, &mut report)
                .await
            {
                Ok(questions) => questions,
                Err(e) => {
                    let role = ContractRole::Questions;
                    return Err(abort(Stage::DeployQuestions, role, e, report));
                }
            };

            let status = self.verify(Stage::VerifyQuestions, &questions).await;
            report.set_verification(ContractRole::Questions, status);
        }

        tracing::info!(
            stage = %Stage::Done,
            %network,
            deployed = report.deployed().count(),
            "Deployment complete"
        );

        report.finish();
        Ok(report)
    }

    async fn deploy(
        &self,
        stage: Stage,
        spec: &DeploymentSpec,
        resolved: &ResolvedAddresses,
        report: &mut DeploymentReport,
    ) -> Result<DeploymentResult, DeployError> {
        tracing::info!(
            %stage,
            contract = %spec.contract_name,
            "Deploying {}...",
            spec.contract_name
        );

        let result = self.deployer.deploy(spec, resolved).await?;
        report.record_deployed(&result);
        Ok(result)
    }

    async fn grant_minter_role(
        &self,
        votes: Address,
        auction: Address,
    ) -> Result<PermissionGrant, DeployError> {
        let stage = Stage::GrantMinterRole;
        let role_id = minter_role();
        tracing::info!(
            %stage,
            %votes,
            grantee = %auction,
            "Granting {MINTER_ROLE} to the auction..."
        );

        let factory = self.deployer.factory(ContractRole::Votes.contract_name())?;
        let receipt = self
            .deployer
            .transact(
                votes,
                &factory,
                "grantRole",
                &[ArgValue::Word(role_id), ArgValue::Address(auction)],
            )
            .await?;

        tracing::info!(%stage, tx_hash = %receipt.tx_hash, "{MINTER_ROLE} granted");

        Ok(PermissionGrant {
            granted_on: votes,
            role_name: MINTER_ROLE.to_string(),
            role_id,
            grantee: auction,
            tx_hash: receipt.tx_hash,
        })
    }

    /// Best-effort verification; failures are logged and reported, never raised.
    async fn verify(&self, stage: Stage, result: &DeploymentResult) -> VerificationStatus {
        let Some(verifier) = &self.verifier else {
            tracing::debug!(%stage, contract = %result.contract_name, "Verification disabled");
            return VerificationStatus::Skipped;
        };

        let request = VerificationRequest::from(result);
        let status = VerificationStatus::from(verifier.verify(&request).await);
        if let VerificationStatus::Failed(reason) = &status {
            tracing::warn!(
                %stage,
                contract = %result.contract_name,
                address = %result.address,
                %reason,
                "Verification failed, continuing"
            );
        }
        status
    }
}

/// Close the run at `stage`, recording deployment failures in the report.
fn abort(
    stage: Stage,
    role: ContractRole,
    source: DeployError,
    mut report: DeploymentReport,
) -> OrchestrationError {
    if matches!(
        stage,
        Stage::DeployVotes | Stage::DeployAuction | Stage::DeployQuestions
    ) {
        if source.is_outcome_unknown() {
            report.record_unconfirmed(role, source.to_string());
        } else {
            report.record_failed(role, source.to_string());
        }
    }
    report.finish();

    let error = OrchestrationError {
        stage,
        contract: role.contract_name().to_string(),
        source,
        report,
    };
    tracing::error!(
        %stage,
        contract = %error.contract,
        partial = error.is_partial(),
        error = %error.source,
        "Deployment aborted"
    );
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minter_role_hash() {
        assert_eq!(
            minter_role(),
            alloy_core::primitives::b256!(
                "9f2df0fed2c77648de5860a4cc508cd0818c85b8b8a1ab4ceeef8d981c8956a6"
            )
        );
    }

    #[test]
    fn test_stage_order() {
        let order = [
            Stage::Init,
            Stage::DeployVotes,
            Stage::DeployAuction,
            Stage::GrantMinterRole,
            Stage::VerifyAuction,
            Stage::DeployQuestions,
            Stage::VerifyQuestions,
            Stage::Done,
        ];
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Stage::GrantMinterRole.to_string(), "GrantMinterRole");
    }
}
